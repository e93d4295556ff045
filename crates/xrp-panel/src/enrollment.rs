#![forbid(unsafe_code)]

//! Supporter-tier enrollment workflow.
//!
//! A step-based state machine behind the supporter-tier modal. Each step is a
//! variant of [`EnrollmentView`] carrying exactly the data it renders. User
//! input and backend results arrive as [`EnrollmentEvent`]s;
//! [`Enrollment::handle`] updates the view and returns the
//! [`EnrollmentEffect`]s the panel must carry out (network calls, timers,
//! closing the modal). The machine itself performs no I/O.
//!
//! ```text
//!  NoLicense ──retry, renewed──────────────────────────────▶ Done
//!      │ retry, license present
//!      ▼
//!  Enroll / Renew ──donate──▶ Donate ──donated, no token──▶ VerifyToken ◀─┐
//!      │ already donated                                     │    │        │
//!      ├── with token: refresh (renewed ▶ Done)              │    ▼        │
//!      └── without token ───────────────────────────────────▶┘ RequestToken
//! ```
//!
//! Any step can be cancelled, which moves to `Done` and closes the modal.
//! Errors are local to the step; they never close the modal.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};
use xrp_core::entitlement::SupporterTierDetails;

use crate::backend::BackendResult;
use crate::shell::DONATION_URL;

/// Tokens are verified as soon as this many characters are entered.
pub const TOKEN_LENGTH: usize = 6;

/// Shown when a request fails for reasons the user cannot fix.
pub const GENERIC_ERROR: &str = "An error occurred. Please report this issue if it persists.";

const EMAIL_PATTERN: &str = r"^[0-9A-Za-z_]+([.+-]?[0-9A-Za-z_]+)*@[0-9A-Za-z_]+([.-]?[0-9A-Za-z_]+)*(\.[0-9A-Za-z_]{2,})+$";

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

/// Syntactic email check: local part, optional separators, `@`, and a domain
/// with at least one dot and a TLD of two or more characters.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

fn invalid_token_message(token: &str) -> String {
    format!(
        "Token \"{token}\" is invalid, was requested from another device, or the server couldn't \
         be reached. Please make sure your device is online, or request a new token."
    )
}

// ---------------------------------------------------------------------------
// License refresh result
// ---------------------------------------------------------------------------

/// Outcome of a license refresh, compared against the state before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshLicenseResponse {
    pub details: SupporterTierDetails,
    /// The supporter tier became active, or lost its expiry.
    pub is_renewed: bool,
}

impl RefreshLicenseResponse {
    /// Compare details before and after a refresh.
    #[must_use]
    pub fn between(before: &SupporterTierDetails, after: SupporterTierDetails) -> Self {
        let extended =
            before.time_remaining_text.is_some() && after.time_remaining_text.is_none();
        let is_renewed = after.active && (!before.active || extended);
        Self {
            details: after,
            is_renewed,
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoLicenseStep {
    pub fetching: bool,
}

/// Shared data of the Enroll and Renew steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AboutStep {
    pub fetching: bool,
    /// Set after a refresh that did not renew.
    pub show_try_new_token: bool,
    pub time_remaining_text: Option<String>,
    pub funds_needed: Option<f64>,
    pub lifetime_funds_needed: Option<f64>,
}

impl AboutStep {
    fn from_details(details: &SupporterTierDetails) -> Self {
        Self {
            fetching: false,
            show_try_new_token: false,
            time_remaining_text: details.time_remaining_text.clone(),
            funds_needed: details.funds_needed,
            lifetime_funds_needed: details.lifetime_funds_needed,
        }
    }

    /// Label of the secondary button.
    #[must_use]
    pub fn secondary_label(&self) -> &'static str {
        if self.show_try_new_token {
            "Try a new token"
        } else if self.fetching {
            "Refreshing license"
        } else {
            "I've already donated"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DonateStep {
    pub fetching: bool,
    pub funds_needed: Option<f64>,
    pub lifetime_funds_needed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyTokenStep {
    /// Uppercased input.
    pub token: String,
    pub checking: bool,
    pub error: Option<String>,
    pub success: bool,
    /// Post-verification license refresh in flight.
    pub refreshing: bool,
}

impl VerifyTokenStep {
    /// "I need a new token" is unavailable while checking or after success.
    #[must_use]
    pub fn can_request_new_token(&self) -> bool {
        !self.checking && !self.success
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestTokenStep {
    pub email: String,
    pub requesting: bool,
    pub error: Option<String>,
}

impl RequestTokenStep {
    #[must_use]
    pub fn email_valid(&self) -> bool {
        is_valid_email(&self.email)
    }

    /// The submit button is enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.requesting && self.email_valid()
    }
}

/// The current enrollment step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum EnrollmentView {
    NoLicense(NoLicenseStep),
    Enroll(AboutStep),
    Renew(AboutStep),
    Donate(DonateStep),
    VerifyToken(VerifyTokenStep),
    RequestToken(RequestTokenStep),
    Done,
}

impl EnrollmentView {
    /// Derive the opening step from supporter-tier details.
    #[must_use]
    pub fn initial(details: &SupporterTierDetails) -> Self {
        if !details.license_present {
            return Self::NoLicense(NoLicenseStep::default());
        }
        let expiring = details
            .time_remaining_text
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        if details.confirmed_token && expiring {
            Self::Renew(AboutStep::from_details(details))
        } else {
            Self::Enroll(AboutStep::from_details(details))
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::NoLicense(_) => "Supporter Tier - Device offline",
            Self::Enroll(_) => "Supporter Tier",
            Self::Renew(_) => "Supporter Tier - Renewal",
            Self::Donate(_) => "Supporter Tier - Donate",
            Self::VerifyToken(_) => "Supporter Tier - Verify Token",
            Self::RequestToken(_) => "Supporter Tier - Request Token",
            Self::Done => "Supporter Tier",
        }
    }

    /// Stable step name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoLicense(_) => "no_license",
            Self::Enroll(_) => "enroll",
            Self::Renew(_) => "renew",
            Self::Donate(_) => "donate",
            Self::VerifyToken(_) => "verify_token",
            Self::RequestToken(_) => "request_token",
            Self::Done => "done",
        }
    }
}

// ---------------------------------------------------------------------------
// Events and effects
// ---------------------------------------------------------------------------

/// Input to the enrollment machine.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentEvent {
    /// "I'm online now" on the device-offline step.
    RetryFetch,
    /// "Donate now" / "Renew now".
    ChooseDonate,
    /// "I've already donated".
    AlreadyDonated,
    /// "Try a new token", offered after a refresh that did not renew.
    TryNewToken,
    /// "Okay, I've donated".
    ConfirmDonated,
    /// The donation link was activated.
    OpenDonationLink,
    /// Token field changed.
    TokenInput(String),
    /// "I need a new token".
    NeedNewToken,
    /// Email field changed.
    EmailInput(String),
    /// "Send verification".
    SubmitEmail,
    /// Cancel button or Escape.
    Cancel,
    LicenseRefreshed(BackendResult<RefreshLicenseResponse>),
    TokenVerified(BackendResult<bool>),
    TokenRequested(BackendResult<bool>),
    /// The post-verification close delay elapsed.
    AutoCloseElapsed,
}

impl EnrollmentEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::RetryFetch => "retry_fetch",
            Self::ChooseDonate => "choose_donate",
            Self::AlreadyDonated => "already_donated",
            Self::TryNewToken => "try_new_token",
            Self::ConfirmDonated => "confirm_donated",
            Self::OpenDonationLink => "open_donation_link",
            Self::TokenInput(_) => "token_input",
            Self::NeedNewToken => "need_new_token",
            Self::EmailInput(_) => "email_input",
            Self::SubmitEmail => "submit_email",
            Self::Cancel => "cancel",
            Self::LicenseRefreshed(_) => "license_refreshed",
            Self::TokenVerified(_) => "token_verified",
            Self::TokenRequested(_) => "token_requested",
            Self::AutoCloseElapsed => "auto_close_elapsed",
        }
    }
}

/// Side effects requested by the machine, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentEffect {
    /// Refresh the license and answer with `LicenseRefreshed`.
    RefreshLicense,
    /// Verify a token and answer with `TokenVerified`.
    VerifyToken(String),
    /// Request a token and answer with `TokenRequested`.
    RequestToken(String),
    /// Deliver `AutoCloseElapsed` after the success delay.
    ScheduleClose,
    /// Close the modal.
    Close,
    /// Open a URL outside the shell.
    NavigateExternal(String),
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// The enrollment state machine for one modal session.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    view: EnrollmentView,
    confirmed_token: bool,
}

impl Enrollment {
    #[must_use]
    pub fn new(details: &SupporterTierDetails) -> Self {
        let view = EnrollmentView::initial(details);
        debug!(step = view.name(), "enrollment opened");
        Self {
            view,
            confirmed_token: details.confirmed_token,
        }
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> &EnrollmentView {
        &self.view
    }

    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.view == EnrollmentView::Done
    }

    /// Whether the device holds a verified donor token.
    #[inline]
    #[must_use]
    pub fn confirmed_token(&self) -> bool {
        self.confirmed_token
    }

    /// Apply one event and return the effects to perform.
    pub fn handle(&mut self, event: EnrollmentEvent) -> Vec<EnrollmentEffect> {
        use EnrollmentEffect as Fx;
        use EnrollmentEvent as Ev;
        use EnrollmentView as V;

        let event_name = event.name();
        let from = self.view.name();

        let (next, effects) = match (&mut self.view, event) {
            (V::Done, _) => (None, vec![]),
            (_, Ev::Cancel) => (Some(V::Done), vec![Fx::Close]),

            // Device offline.
            (V::NoLicense(step), Ev::RetryFetch) if !step.fetching => {
                step.fetching = true;
                (None, vec![Fx::RefreshLicense])
            }
            (V::NoLicense(step), Ev::LicenseRefreshed(result)) if step.fetching => {
                step.fetching = false;
                match result {
                    Ok(res) if res.is_renewed => (Some(V::Done), vec![Fx::Close]),
                    Ok(res) if res.details.license_present => {
                        self.confirmed_token = res.details.confirmed_token;
                        (Some(V::initial(&res.details)), vec![])
                    }
                    _ => (None, vec![]),
                }
            }

            // Enroll / Renew.
            (V::Enroll(step) | V::Renew(step), Ev::ChooseDonate) if !step.fetching => (
                Some(V::Donate(DonateStep {
                    fetching: false,
                    funds_needed: step.funds_needed,
                    lifetime_funds_needed: step.lifetime_funds_needed,
                })),
                vec![],
            ),
            (V::Enroll(step) | V::Renew(step), Ev::AlreadyDonated)
                if !step.fetching && !step.show_try_new_token =>
            {
                if self.confirmed_token {
                    step.fetching = true;
                    (None, vec![Fx::RefreshLicense])
                } else {
                    (Some(V::VerifyToken(VerifyTokenStep::default())), vec![])
                }
            }
            (V::Enroll(step) | V::Renew(step), Ev::TryNewToken)
                if step.show_try_new_token && !step.fetching =>
            {
                (Some(V::VerifyToken(VerifyTokenStep::default())), vec![])
            }
            (V::Enroll(step) | V::Renew(step), Ev::LicenseRefreshed(result)) if step.fetching => {
                step.fetching = false;
                match result {
                    Ok(res) if res.is_renewed => (Some(V::Done), vec![Fx::Close]),
                    Ok(res) => {
                        step.time_remaining_text = res.details.time_remaining_text;
                        step.funds_needed = res.details.funds_needed;
                        step.lifetime_funds_needed = res.details.lifetime_funds_needed;
                        step.show_try_new_token = true;
                        (None, vec![])
                    }
                    Err(_) => (None, vec![]),
                }
            }

            // Donate.
            (V::Donate(step), Ev::ConfirmDonated) if !step.fetching => {
                if self.confirmed_token {
                    step.fetching = true;
                    (None, vec![Fx::RefreshLicense])
                } else {
                    (Some(V::VerifyToken(VerifyTokenStep::default())), vec![])
                }
            }
            (V::Donate(_), Ev::OpenDonationLink) => (
                Some(V::Done),
                vec![Fx::Close, Fx::NavigateExternal(DONATION_URL.to_string())],
            ),
            (V::Donate(step), Ev::LicenseRefreshed(result)) if step.fetching => {
                step.fetching = false;
                match result {
                    Ok(res) if res.is_renewed => (Some(V::Done), vec![Fx::Close]),
                    Ok(res) => {
                        step.funds_needed = res.details.funds_needed;
                        step.lifetime_funds_needed = res.details.lifetime_funds_needed;
                        (None, vec![])
                    }
                    Err(_) => (None, vec![]),
                }
            }

            // Verify token.
            (V::VerifyToken(step), Ev::TokenInput(raw)) if !step.checking && !step.success => {
                step.token = raw.to_uppercase();
                if step.token.chars().count() == TOKEN_LENGTH {
                    step.checking = true;
                    (None, vec![Fx::VerifyToken(step.token.clone())])
                } else {
                    if !step.token.is_empty() {
                        step.error = None;
                    }
                    (None, vec![])
                }
            }
            (V::VerifyToken(step), Ev::TokenVerified(result)) if step.checking => {
                step.checking = false;
                match result {
                    Ok(true) => {
                        step.success = true;
                        step.error = None;
                        step.refreshing = true;
                        (None, vec![Fx::RefreshLicense])
                    }
                    Ok(false) => {
                        step.error = Some(invalid_token_message(&step.token));
                        step.token.clear();
                        (None, vec![])
                    }
                    Err(_) => {
                        step.error = Some(GENERIC_ERROR.to_string());
                        (None, vec![])
                    }
                }
            }
            (V::VerifyToken(step), Ev::LicenseRefreshed(result)) if step.refreshing => {
                step.refreshing = false;
                match result {
                    Ok(res) => {
                        self.confirmed_token = res.details.confirmed_token || self.confirmed_token;
                        (None, vec![Fx::ScheduleClose])
                    }
                    // The token is verified either way; the error stays up
                    // until the close.
                    Err(_) => {
                        step.error = Some(GENERIC_ERROR.to_string());
                        (None, vec![Fx::ScheduleClose])
                    }
                }
            }
            (V::VerifyToken(step), Ev::AutoCloseElapsed) if step.success => {
                (Some(V::Done), vec![Fx::Close])
            }
            (V::VerifyToken(step), Ev::NeedNewToken) if step.can_request_new_token() => {
                (Some(V::RequestToken(RequestTokenStep::default())), vec![])
            }

            // Request token.
            (V::RequestToken(step), Ev::EmailInput(email)) if !step.requesting => {
                step.email = email;
                step.error = None;
                (None, vec![])
            }
            (V::RequestToken(step), Ev::SubmitEmail) if step.can_submit() => {
                step.requesting = true;
                step.error = None;
                (None, vec![Fx::RequestToken(step.email.clone())])
            }
            (V::RequestToken(step), Ev::TokenRequested(result)) if step.requesting => {
                step.requesting = false;
                match result {
                    Ok(true) => (Some(V::VerifyToken(VerifyTokenStep::default())), vec![]),
                    Ok(false) | Err(_) => {
                        step.error = Some(GENERIC_ERROR.to_string());
                        (None, vec![])
                    }
                }
            }

            _ => {
                trace!(step = from, event = event_name, "enrollment event ignored");
                (None, vec![])
            }
        };

        if let Some(next) = next {
            debug!(from, to = next.name(), event = event_name, "enrollment transition");
            self.view = next;
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    fn details() -> SupporterTierDetails {
        SupporterTierDetails {
            license_present: true,
            funds_needed: Some(10.0),
            lifetime_funds_needed: Some(50.0),
            ..SupporterTierDetails::default()
        }
    }

    fn refreshed(details: SupporterTierDetails, is_renewed: bool) -> EnrollmentEvent {
        EnrollmentEvent::LicenseRefreshed(Ok(RefreshLicenseResponse {
            details,
            is_renewed,
        }))
    }

    #[test]
    fn initial_view_derivation() {
        let none = SupporterTierDetails::default();
        assert!(matches!(EnrollmentView::initial(&none), EnrollmentView::NoLicense(_)));

        let mut renew = details();
        renew.confirmed_token = true;
        renew.time_remaining_text = Some("3 days".into());
        assert!(matches!(EnrollmentView::initial(&renew), EnrollmentView::Renew(_)));

        renew.confirmed_token = false;
        assert!(matches!(EnrollmentView::initial(&renew), EnrollmentView::Enroll(_)));

        let mut token_only = details();
        token_only.confirmed_token = true;
        assert!(matches!(EnrollmentView::initial(&token_only), EnrollmentView::Enroll(_)));
    }

    #[test]
    fn no_license_retry_re_derives_view() {
        let mut e = Enrollment::new(&SupporterTierDetails::default());

        assert_eq!(e.handle(EnrollmentEvent::RetryFetch), vec![EnrollmentEffect::RefreshLicense]);
        // Busy: a second press is ignored.
        assert!(e.handle(EnrollmentEvent::RetryFetch).is_empty());

        assert!(e.handle(refreshed(details(), false)).is_empty());
        assert!(matches!(e.view(), EnrollmentView::Enroll(_)));
    }

    #[test]
    fn no_license_retry_without_license_stays() {
        let mut e = Enrollment::new(&SupporterTierDetails::default());
        e.handle(EnrollmentEvent::RetryFetch);
        e.handle(refreshed(SupporterTierDetails::default(), false));
        assert_eq!(e.view(), &EnrollmentView::NoLicense(NoLicenseStep { fetching: false }));
    }

    #[test]
    fn renewed_refresh_closes() {
        let mut e = Enrollment::new(&SupporterTierDetails::default());
        e.handle(EnrollmentEvent::RetryFetch);
        assert_eq!(e.handle(refreshed(details(), true)), vec![EnrollmentEffect::Close]);
        assert!(e.is_done());
    }

    #[test]
    fn already_donated_without_token_goes_to_verify() {
        let mut e = Enrollment::new(&details());
        assert!(e.handle(EnrollmentEvent::AlreadyDonated).is_empty());
        assert!(matches!(e.view(), EnrollmentView::VerifyToken(_)));
    }

    #[test]
    fn already_donated_with_token_refreshes_and_offers_new_token() {
        let mut d = details();
        d.confirmed_token = true;
        let mut e = Enrollment::new(&d);

        assert_eq!(
            e.handle(EnrollmentEvent::AlreadyDonated),
            vec![EnrollmentEffect::RefreshLicense]
        );
        let mut after = d.clone();
        after.funds_needed = Some(4.0);
        e.handle(refreshed(after, false));

        let EnrollmentView::Enroll(step) = e.view() else {
            panic!("expected enroll step");
        };
        assert!(step.show_try_new_token);
        assert_eq!(step.funds_needed, Some(4.0));
        assert_eq!(step.secondary_label(), "Try a new token");

        e.handle(EnrollmentEvent::TryNewToken);
        assert!(matches!(e.view(), EnrollmentView::VerifyToken(_)));
    }

    #[test]
    fn donate_link_closes_then_navigates() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::ChooseDonate);
        let EnrollmentView::Donate(step) = e.view() else {
            panic!("expected donate step");
        };
        assert_eq!(step.lifetime_funds_needed, Some(50.0));

        assert_eq!(
            e.handle(EnrollmentEvent::OpenDonationLink),
            vec![
                EnrollmentEffect::Close,
                EnrollmentEffect::NavigateExternal("https://ko-fi.com/wheaney".into()),
            ]
        );
        assert!(e.is_done());
    }

    #[test]
    fn donated_with_token_refreshes() {
        let mut d = details();
        d.confirmed_token = true;
        let mut e = Enrollment::new(&d);
        e.handle(EnrollmentEvent::ChooseDonate);

        assert_eq!(
            e.handle(EnrollmentEvent::ConfirmDonated),
            vec![EnrollmentEffect::RefreshLicense]
        );
        assert_eq!(e.handle(refreshed(d, true)), vec![EnrollmentEffect::Close]);
    }

    #[test]
    fn token_auto_verifies_at_six_characters() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::AlreadyDonated);

        assert!(e.handle(EnrollmentEvent::TokenInput("ab1".into())).is_empty());
        assert_eq!(
            e.handle(EnrollmentEvent::TokenInput("ab12cd".into())),
            vec![EnrollmentEffect::VerifyToken("AB12CD".into())]
        );
        // Input is ignored while checking.
        assert!(e.handle(EnrollmentEvent::TokenInput("zzzzzz".into())).is_empty());
        assert!(e.handle(EnrollmentEvent::NeedNewToken).is_empty());
    }

    #[test]
    fn rejected_token_shows_error_and_clears_field() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::AlreadyDonated);
        e.handle(EnrollmentEvent::TokenInput("XYZ789".into()));
        e.handle(EnrollmentEvent::TokenVerified(Ok(false)));

        let EnrollmentView::VerifyToken(step) = e.view() else {
            panic!("expected verify step");
        };
        assert!(step.token.is_empty());
        assert_eq!(
            step.error.as_deref(),
            Some(
                "Token \"XYZ789\" is invalid, was requested from another device, or the server \
                 couldn't be reached. Please make sure your device is online, or request a new token."
            )
        );

        // Typing again clears the error.
        e.handle(EnrollmentEvent::TokenInput("X".into()));
        let EnrollmentView::VerifyToken(step) = e.view() else {
            panic!("expected verify step");
        };
        assert_eq!(step.error, None);
    }

    #[test]
    fn verify_failure_is_generic_error() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::AlreadyDonated);
        e.handle(EnrollmentEvent::TokenInput("ABCDEF".into()));
        e.handle(EnrollmentEvent::TokenVerified(Err(BackendError::Transport("down".into()))));

        let EnrollmentView::VerifyToken(step) = e.view() else {
            panic!("expected verify step");
        };
        assert_eq!(step.error.as_deref(), Some(GENERIC_ERROR));
        assert_eq!(step.token, "ABCDEF");
    }

    #[test]
    fn verified_token_refreshes_then_schedules_close() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::AlreadyDonated);
        e.handle(EnrollmentEvent::TokenInput("ABCDEF".into()));

        assert_eq!(
            e.handle(EnrollmentEvent::TokenVerified(Ok(true))),
            vec![EnrollmentEffect::RefreshLicense]
        );
        assert!(e.handle(EnrollmentEvent::NeedNewToken).is_empty());
        assert_eq!(
            e.handle(refreshed(details(), false)),
            vec![EnrollmentEffect::ScheduleClose]
        );
        assert_eq!(
            e.handle(EnrollmentEvent::AutoCloseElapsed),
            vec![EnrollmentEffect::Close]
        );
        assert!(e.is_done());
    }

    #[test]
    fn failed_refresh_after_verify_still_closes() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::AlreadyDonated);
        e.handle(EnrollmentEvent::TokenInput("ABCDEF".into()));
        e.handle(EnrollmentEvent::TokenVerified(Ok(true)));

        assert_eq!(
            e.handle(EnrollmentEvent::LicenseRefreshed(Err(BackendError::Transport(
                "offline".into()
            )))),
            vec![EnrollmentEffect::ScheduleClose]
        );
        let EnrollmentView::VerifyToken(step) = e.view() else {
            panic!("expected verify step");
        };
        assert!(step.success);
        assert_eq!(step.error.as_deref(), Some(GENERIC_ERROR));

        assert_eq!(
            e.handle(EnrollmentEvent::AutoCloseElapsed),
            vec![EnrollmentEffect::Close]
        );
        assert!(e.is_done());
    }

    #[test]
    fn request_token_requires_valid_email() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::AlreadyDonated);
        e.handle(EnrollmentEvent::NeedNewToken);

        e.handle(EnrollmentEvent::EmailInput("not-an-email".into()));
        assert!(e.handle(EnrollmentEvent::SubmitEmail).is_empty());

        e.handle(EnrollmentEvent::EmailInput("fan@example.com".into()));
        assert_eq!(
            e.handle(EnrollmentEvent::SubmitEmail),
            vec![EnrollmentEffect::RequestToken("fan@example.com".into())]
        );
        // Disabled while requesting.
        assert!(e.handle(EnrollmentEvent::SubmitEmail).is_empty());

        e.handle(EnrollmentEvent::TokenRequested(Ok(true)));
        assert!(matches!(e.view(), EnrollmentView::VerifyToken(_)));
    }

    #[test]
    fn request_token_failure_stays_with_error() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::AlreadyDonated);
        e.handle(EnrollmentEvent::NeedNewToken);
        e.handle(EnrollmentEvent::EmailInput("fan@example.com".into()));
        e.handle(EnrollmentEvent::SubmitEmail);
        e.handle(EnrollmentEvent::TokenRequested(Err(BackendError::Backend("smtp".into()))));

        let EnrollmentView::RequestToken(step) = e.view() else {
            panic!("expected request step");
        };
        assert_eq!(step.error.as_deref(), Some(GENERIC_ERROR));
        assert!(step.can_submit());
    }

    #[test]
    fn cancel_closes_from_any_step() {
        let mut e = Enrollment::new(&details());
        e.handle(EnrollmentEvent::ChooseDonate);
        assert_eq!(e.handle(EnrollmentEvent::Cancel), vec![EnrollmentEffect::Close]);
        assert!(e.is_done());
        assert!(e.handle(EnrollmentEvent::Cancel).is_empty());
    }

    #[test]
    fn email_pattern() {
        for ok in ["a@b.co", "first.last+tag@mail.example.org", "x_y@sub-domain.io"] {
            assert!(is_valid_email(ok), "{ok}");
        }
        for bad in ["", "a@b", "a@b.c", "@b.com", "a b@c.com", "a..b@c.com"] {
            assert!(!is_valid_email(bad), "{bad}");
        }
    }

    #[test]
    fn renewal_detection() {
        let inactive = SupporterTierDetails::default();
        let active = SupporterTierDetails {
            active: true,
            ..SupporterTierDetails::default()
        };
        let expiring = SupporterTierDetails {
            active: true,
            time_remaining_text: Some("2 days".into()),
            ..SupporterTierDetails::default()
        };

        assert!(RefreshLicenseResponse::between(&inactive, active.clone()).is_renewed);
        assert!(RefreshLicenseResponse::between(&expiring, active.clone()).is_renewed);
        assert!(!RefreshLicenseResponse::between(&expiring, expiring.clone()).is_renewed);
        assert!(!RefreshLicenseResponse::between(&active, inactive).is_renewed);
    }
}
