//! Wizard step ordering.

use serde::{Deserialize, Serialize};

/// A position in the onboarding sequence.
///
/// Progresses linearly: SignUp → VerifyCode → CompanyInfo → Goals →
/// Review → Success. Only `retreat` moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SignUp,
    VerifyCode,
    CompanyInfo,
    Goals,
    Review,
    Success,
}

impl Step {
    /// Every step in order.
    pub const ALL: [Step; 6] = [
        Step::SignUp,
        Step::VerifyCode,
        Step::CompanyInfo,
        Step::Goals,
        Step::Review,
        Step::Success,
    ];

    /// Zero-based position in the sequence.
    pub fn index(&self) -> usize {
        match self {
            Self::SignUp => 0,
            Self::VerifyCode => 1,
            Self::CompanyInfo => 2,
            Self::Goals => 3,
            Self::Review => 4,
            Self::Success => 5,
        }
    }

    /// Check if a forward move from `self` to `target` is valid.
    pub fn can_advance_to(&self, target: Step) -> bool {
        self.next() == Some(target)
    }

    /// Whether `retreat` is permitted from this step.
    pub fn can_retreat(&self) -> bool {
        !matches!(self, Self::SignUp | Self::Success)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether moving forward from this step issues an external call.
    pub fn advance_calls_out(&self) -> bool {
        matches!(self, Self::SignUp | Self::VerifyCode | Self::Review)
    }

    pub fn next(&self) -> Option<Step> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(&self) -> Option<Step> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Percentage complete shown alongside this step.
    pub fn progress(&self) -> u8 {
        if self.is_terminal() {
            return 100;
        }
        let ratio = (self.index() + 1) as f64 / Self::ALL.len() as f64;
        (ratio * 100.0).round() as u8
    }

    /// Short stepper label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SignUp => "Sign Up",
            Self::VerifyCode => "Verify",
            Self::CompanyInfo => "Company",
            Self::Goals => "Goals",
            Self::Review => "Review",
            Self::Success => "Complete",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::SignUp => "Create owner account",
            Self::VerifyCode => "Verify your identity",
            Self::CompanyInfo => "Define company context",
            Self::Goals => "Set strategic goals",
            Self::Review => "Review and submit",
            Self::Success => "Registration complete",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            Self::SignUp => {
                "Use your business details to initialize your bot onboarding workspace."
            }
            Self::VerifyCode => "Enter the one-time code sent to your business email address.",
            Self::CompanyInfo => {
                "Provide a clear profile so the agent can represent your company accurately."
            }
            Self::Goals => {
                "Define short-term and long-term outcomes for better matching and strategy."
            }
            Self::Review => "Validate all onboarding details before final submission.",
            Self::Success => "Your business agent is now active in the registry.",
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::SignUp
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SignUp => "sign_up",
            Self::VerifyCode => "verify_code",
            Self::CompanyInfo => "company_info",
            Self::Goals => "goals",
            Self::Review => "review",
            Self::Success => "success",
        };
        write!(f, "{s}")
    }
}
