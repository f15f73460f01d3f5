use serde::Deserialize;

use crate::client::SignUpMetadata;

/// Sign-in form posted by the login page.
#[derive(Debug, Deserialize)]
pub(super) struct SignInForm {
    pub(super) email: String,
    pub(super) password: String,
}

/// Registration form. Optional fields may be left blank.
#[derive(Debug, Deserialize)]
pub(super) struct RegisterForm {
    pub(super) email: String,
    pub(super) password: String,
    #[serde(default)]
    pub(super) full_name: String,
    #[serde(default)]
    pub(super) phone: String,
    #[serde(default)]
    pub(super) company_name: String,
}

impl RegisterForm {
    pub(super) fn metadata(&self) -> SignUpMetadata {
        SignUpMetadata {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            company_name: self.company_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ForgotPasswordForm {
    pub(super) email: String,
}

/// New-password form posted by the reset page, carrying the recovery token
/// the reset email handed to that page.
#[derive(Debug, Deserialize)]
pub(super) struct ResetPasswordForm {
    pub(super) access_token: String,
    pub(super) password: String,
}
