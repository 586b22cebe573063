//! Account activation lifecycle.
//!
//! [`AccountController`] is a pure state machine: operations return the
//! request to send and [`AccountController::complete`] consumes its response,
//! possibly yielding a follow-up request. [`AccountSession`] drives it over a
//! [`SettingsClient`].
//!
//! Every request is tagged with the account and selection sequence it was
//! issued for. A response whose tag no longer matches the current selection is
//! dropped, so a slow status reply for a previously selected account can never
//! overwrite the state of the current one.

use crate::{
    error::{ClientError, ClientResult},
    http_client::Transport,
    pages::Feedback,
    settings_client::SettingsClient,
};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::fmt;

pub const STATUS_ENDPOINT: &str = "/api/usermod/status";
pub const ACTIVATE_ENDPOINT: &str = "/api/usermod/activate";
pub const DEACTIVATE_ENDPOINT: &str = "/api/usermod/deactivate";

/// Characters the controller accepts as password specials
pub const PASSWORD_SPECIALS: &str = ",.:-_#+~<>!§$%&(){}=?@";
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountState {
    NoSelection,
    Loading,
    Enabled,
    Disabled,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountState::NoSelection => "no selection",
            AccountState::Loading => "loading",
            AccountState::Enabled => "enabled",
            AccountState::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct AccountStatus {
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTag {
    pub account: String,
    pub seq: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountRequest {
    FetchStatus { tag: RequestTag },
    Activate { tag: RequestTag, password: String },
    Deactivate { tag: RequestTag },
}

impl AccountRequest {
    pub fn tag(&self) -> &RequestTag {
        match self {
            AccountRequest::FetchStatus { tag }
            | AccountRequest::Activate { tag, .. }
            | AccountRequest::Deactivate { tag } => tag,
        }
    }

    pub fn path(&self) -> String {
        let (endpoint, tag) = match self {
            AccountRequest::FetchStatus { tag } => (STATUS_ENDPOINT, tag),
            AccountRequest::Activate { tag, .. } => (ACTIVATE_ENDPOINT, tag),
            AccountRequest::Deactivate { tag } => (DEACTIVATE_ENDPOINT, tag),
        };
        format!("{endpoint}/{}", tag.account)
    }
}

#[derive(Debug)]
pub enum AccountResponse {
    Status(ClientResult<AccountStatus>),
    Action(bool),
}

/// What the account page shows for the current selection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountView {
    pub account: String,
    pub state: AccountState,
    pub loading: bool,
    pub can_enable: bool,
    pub can_disable: bool,
    pub can_change_password: bool,
    pub elevated_warning: bool,
    pub feedback: Option<Feedback>,
}

pub struct AccountController {
    elevated: String,
    account: String,
    state: AccountState,
    seq: u64,
    feedback: Option<Feedback>,
}

impl AccountController {
    pub fn new(elevated: &str) -> Self {
        AccountController {
            elevated: elevated.to_string(),
            account: String::new(),
            state: AccountState::NoSelection,
            seq: 0,
            feedback: None,
        }
    }

    pub fn state(&self) -> AccountState {
        self.state
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn is_elevated(&self) -> bool {
        !self.account.is_empty() && self.account == self.elevated
    }

    /// Transient outcome of the last account action, cleared once taken
    pub fn take_feedback(&mut self) -> Option<Feedback> {
        self.feedback.take()
    }

    /// Switch to `account`; an empty identifier clears the selection.
    ///
    /// Any request still outstanding for the previous selection becomes stale.
    pub fn select(&mut self, account: &str) -> Option<AccountRequest> {
        self.seq += 1;
        self.feedback = None;
        self.account = account.to_string();

        if account.is_empty() {
            info!("account selection cleared");
            self.state = AccountState::NoSelection;
            return None;
        }

        info!("selected account {account}");
        self.state = AccountState::Loading;
        Some(AccountRequest::FetchStatus { tag: self.tag() })
    }

    pub fn disable(&mut self) -> ClientResult<AccountRequest> {
        self.require(AccountState::Enabled, "disable")?;

        if self.is_elevated() {
            return Err(ClientError::InvalidState {
                action: "disable",
                state: format!("{} (elevated account)", self.state),
            });
        }

        self.state = AccountState::Loading;
        Ok(AccountRequest::Deactivate { tag: self.tag() })
    }

    pub fn enable(&mut self, password: &str, confirmation: &str) -> ClientResult<AccountRequest> {
        self.require(AccountState::Disabled, "enable")?;
        self.activate(password, confirmation)
    }

    pub fn change_password(
        &mut self,
        password: &str,
        confirmation: &str,
    ) -> ClientResult<AccountRequest> {
        self.require(AccountState::Enabled, "change password")?;
        self.activate(password, confirmation)
    }

    /// Apply the response to `request`, returning the follow-up request if any
    pub fn complete(
        &mut self,
        request: &AccountRequest,
        response: AccountResponse,
    ) -> Option<AccountRequest> {
        let tag = request.tag();
        if tag.seq != self.seq || tag.account != self.account {
            debug!(
                "ignoring stale response for account {} (seq {})",
                tag.account, tag.seq
            );
            return None;
        }

        match (request, response) {
            (AccountRequest::FetchStatus { .. }, AccountResponse::Status(Ok(status))) => {
                self.state = if status.active {
                    AccountState::Enabled
                } else {
                    AccountState::Disabled
                };
                info!("account {} is {}", self.account, self.state);
                None
            }
            (AccountRequest::FetchStatus { .. }, AccountResponse::Status(Err(e))) => {
                // stays in Loading, the page keeps its placeholder
                error!("loading status of account {} failed: {e}", self.account);
                None
            }
            (
                AccountRequest::Activate { .. } | AccountRequest::Deactivate { .. },
                AccountResponse::Action(success),
            ) => {
                if !success {
                    warn!("account action for {} failed", self.account);
                }
                self.feedback = Some(Feedback::from_success(success));
                self.state = AccountState::Loading;
                Some(AccountRequest::FetchStatus { tag: self.tag() })
            }
            (request, response) => {
                warn!("response {response:?} does not answer {request:?}");
                None
            }
        }
    }

    pub fn view(&self) -> AccountView {
        let elevated = self.is_elevated();

        AccountView {
            account: self.account.clone(),
            state: self.state,
            loading: self.state == AccountState::Loading,
            can_enable: self.state == AccountState::Disabled,
            can_disable: self.state == AccountState::Enabled && !elevated,
            can_change_password: self.state == AccountState::Enabled,
            elevated_warning: elevated,
            feedback: self.feedback,
        }
    }

    fn tag(&self) -> RequestTag {
        RequestTag {
            account: self.account.clone(),
            seq: self.seq,
        }
    }

    fn require(&self, expected: AccountState, action: &'static str) -> ClientResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ClientError::InvalidState {
                action,
                state: self.state.to_string(),
            })
        }
    }

    fn activate(&mut self, password: &str, confirmation: &str) -> ClientResult<AccountRequest> {
        if password != confirmation {
            warn!("password confirmation for {} does not match", self.account);
            self.feedback = Some(Feedback::Failure);
            return Err(ClientError::PasswordMismatch);
        }

        let issues = password_issues(password);
        if !issues.is_empty() {
            // advisory only, the controller has the final say
            warn!("password for {} violates policy: {issues:?}", self.account);
        }

        self.state = AccountState::Loading;
        Ok(AccountRequest::Activate {
            tag: self.tag(),
            password: password.to_string(),
        })
    }
}

/// Send `request` and wrap its outcome for [`AccountController::complete`]
pub async fn perform<T: Transport>(
    client: &SettingsClient<T>,
    request: &AccountRequest,
) -> AccountResponse {
    let path = request.path();

    match request {
        AccountRequest::FetchStatus { .. } => {
            AccountResponse::Status(client.load_json::<AccountStatus>(&path).await)
        }
        AccountRequest::Activate { password, .. } => {
            AccountResponse::Action(client.save_plain(&path, password).await)
        }
        AccountRequest::Deactivate { .. } => {
            AccountResponse::Action(client.save_plain(&path, "").await)
        }
    }
}

/// [`AccountController`] bound to a client, running each operation to quiescence
pub struct AccountSession<T> {
    client: SettingsClient<T>,
    controller: AccountController,
}

impl<T: Transport> AccountSession<T> {
    pub fn new(client: SettingsClient<T>, elevated: &str) -> Self {
        AccountSession {
            client,
            controller: AccountController::new(elevated),
        }
    }

    pub fn controller(&self) -> &AccountController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AccountController {
        &mut self.controller
    }

    pub fn view(&self) -> AccountView {
        self.controller.view()
    }

    pub async fn select(&mut self, account: &str) -> AccountView {
        let request = self.controller.select(account);
        self.drive(request).await;
        self.view()
    }

    pub async fn disable(&mut self) -> ClientResult<AccountView> {
        let request = self.controller.disable()?;
        self.drive(Some(request)).await;
        Ok(self.view())
    }

    pub async fn enable(&mut self, password: &str, confirmation: &str) -> ClientResult<AccountView> {
        let request = self.controller.enable(password, confirmation)?;
        self.drive(Some(request)).await;
        Ok(self.view())
    }

    pub async fn change_password(
        &mut self,
        password: &str,
        confirmation: &str,
    ) -> ClientResult<AccountView> {
        let request = self.controller.change_password(password, confirmation)?;
        self.drive(Some(request)).await;
        Ok(self.view())
    }

    async fn drive(&mut self, mut next: Option<AccountRequest>) {
        while let Some(request) = next {
            let response = perform(&self.client, &request).await;
            next = self.controller.complete(&request, response);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordIssue {
    TooShort,
    TooLong,
    MissingDigit,
    MissingLetter,
    MissingSpecial,
    InvalidCharacter(char),
}

/// Check `password` against the controller's password policy.
///
/// Length is counted in bytes like the controller does, so `§` counts twice.
pub fn password_issues(password: &str) -> Vec<PasswordIssue> {
    let mut issues = Vec::new();

    if password.len() < PASSWORD_MIN_LEN {
        issues.push(PasswordIssue::TooShort);
    }
    if password.len() > PASSWORD_MAX_LEN {
        issues.push(PasswordIssue::TooLong);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push(PasswordIssue::MissingDigit);
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        issues.push(PasswordIssue::MissingLetter);
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        issues.push(PasswordIssue::MissingSpecial);
    }
    if let Some(invalid) = password
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !PASSWORD_SPECIALS.contains(*c))
    {
        issues.push(PasswordIssue::InvalidCharacter(invalid));
    }

    issues
}
