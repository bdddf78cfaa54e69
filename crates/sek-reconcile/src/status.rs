//! Subscription status display line.

use sek_schemas::RenewalState;

use crate::SubscriptionStanding;

/// Status line when no subscription entitlement survives a rebuild.
pub const NEUTRAL_STATUS: &str = "No active subscription";

fn state_text(state: RenewalState) -> &'static str {
    match state {
        RenewalState::Subscribed => "Subscribed",
        RenewalState::Expired => "Expired",
        RenewalState::InGracePeriod => "In grace period",
        RenewalState::Revoked => "Revoked",
        RenewalState::InBillingRetryPeriod => "In billing retry",
        RenewalState::Unknown => "Unknown",
    }
}

/// Compose the display line for a surviving subscription:
/// `"<state-text> - <auto-renew-text>"`.
pub fn status_text(standing: &SubscriptionStanding) -> String {
    let renew = if standing.auto_renew_enabled {
        "auto-renew on"
    } else {
        "auto-renew off"
    };
    format!("{} - {}", state_text(standing.renewal_state), renew)
}
