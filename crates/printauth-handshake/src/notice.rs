//! User-facing notifications emitted by the handshake.

use printauth_core::{ErrorCategory, Notification};

pub fn no_credential() -> Notification {
    Notification::error("Print Canceled", "No email provided. Print canceled.")
}

pub fn authentication_unreachable() -> Notification {
    Notification::error(
        "Communication Error",
        "Error communicating with the authentication endpoint. Check the printer host logs.",
    )
}

/// Remediation for a failed authentication, by category.
pub fn authentication_failed(category: ErrorCategory, message: &str) -> Notification {
    match category {
        ErrorCategory::ConfigurationError => Notification::error(
            "Configuration Error",
            "Could not log into the authentication service or plugin settings are incomplete.\n\
             Please check settings or notify staff.",
        ),
        ErrorCategory::NetworkError => Notification::error(
            "Network Error",
            "Could not contact the authentication service.\n\
             Please check the network or notify staff.",
        ),
        ErrorCategory::PermissionError => Notification::error(
            "Authentication Failed",
            format!("{message}\nPlease check the email address or contact staff."),
        ),
        ErrorCategory::GenericAuthError => {
            Notification::error("Authentication Failed", message.to_string())
        }
    }
}

pub fn material_confirmed(message: &str) -> Notification {
    Notification::success("Material Confirmed", message.to_string())
}

pub fn confirmation_failed(message: &str) -> Notification {
    Notification::error("Confirmation Error", message.to_string())
}

pub fn confirmation_unreachable() -> Notification {
    Notification::error(
        "Communication Error",
        "Error sending the material confirmation. Please try again.",
    )
}
