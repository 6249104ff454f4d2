//! The three ways a session obtains backend credentials, and the single
//! resume point every asynchronous login step comes back through.

use super::Session;
use crate::{
    auth::{Credentials, DeviceCode},
    backend::BackendLink,
    config::AuthType,
    connection::ConnectionPhase,
    error::{AuthError, LinkError},
    frontend::{self, Form, PlayStatus},
    identity::ClientIdentity,
    locale::keys,
};
use std::{sync::Arc, time::Instant};

/// Time of day shown while the player signs in on another device.
const SIGN_IN_TIME: i32 = 16000;

/// Outcome of an asynchronous login step, delivered back onto the
/// session loop.
#[derive(strum::AsRefStr)]
pub enum ResumeEvent {
    CredentialsReady(Credentials),
    RefreshFailed(AuthError),
    DeviceCodeIssued(Result<DeviceCode, AuthError>),
    DeviceLoginFinished(Result<Credentials, AuthError>),
    BackendLinkOpened {
        generation: u64,
        result: Result<BackendLink, LinkError>,
    },
}

impl Session {
    pub(super) fn handle_login(&mut self, identity: ClientIdentity) {
        if let Some(existing) = &self.identity {
            tracing::warn!("{} sent a second login packet", existing.name);
            return;
        }
        tracing::info!(
            "{} connected from {} on {}",
            identity.name,
            self.logged_address(),
            identity.device_os
        );
        self.set_identity(identity);
        self.send_frontend_immediate(frontend::ServerPacket::PlayStatus(PlayStatus::LoginSuccess));

        let auth_type = self.bridge.config().remote.auth_type;
        match auth_type {
            AuthType::Offline | AuthType::Passthrough => {
                let name = self.display_name().to_owned();
                self.authenticate(&name);
            }
            AuthType::Online => {
                let xuid = self
                    .identity
                    .as_ref()
                    .map(|identity| identity.xuid.clone())
                    .unwrap_or_default();
                match self.bridge.refresh_tokens().get(&xuid) {
                    Some(token) => self.authenticate_with_refresh_token(token),
                    None => self.authenticate_with_device_code(),
                }
            }
        }
    }

    /// Enters `Authenticating`. Returns false if a login is already
    /// underway or done.
    fn begin_authentication(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.connection.is_busy() {
            let name = self.display_name().to_owned();
            tracing::error!("{}", self.translate(keys::ALREADY_LOGGED_IN, &[&name]));
            return false;
        }
        if self.phase() != ConnectionPhase::Authenticating
            && !self.set_phase(ConnectionPhase::Authenticating)
        {
            return false;
        }
        self.connection.set_logging_in(true);
        true
    }

    /// Logs in with name-only credentials.
    pub fn authenticate(&mut self, name: &str) {
        if self.identity.is_none() {
            self.set_identity(ClientIdentity::named(name));
        }
        if !self.begin_authentication() {
            return;
        }
        self.resume(ResumeEvent::CredentialsReady(Credentials::offline(name)));
    }

    /// Logs in with a stored refresh token. A rejected token leads to a
    /// prompt instead of a disconnect.
    pub fn authenticate_with_refresh_token(&mut self, refresh_token: String) {
        if !self.begin_authentication() {
            return;
        }
        let refresh = self.bridge.credentials().refresh(&refresh_token);
        self.spawn_resume(async move {
            match refresh.await {
                Ok(credentials) => ResumeEvent::CredentialsReady(credentials),
                Err(e) => ResumeEvent::RefreshFailed(e),
            }
        });
    }

    /// Logs in through a device code shown to the player. A login already
    /// pending for this player is joined rather than started again.
    pub fn authenticate_with_device_code(&mut self) {
        let Some(xuid) = self.identity.as_ref().map(|identity| identity.xuid.clone()) else {
            tracing::error!("Device code login requested before the client sent its identity");
            return;
        };
        if !self.begin_authentication() {
            return;
        }

        self.send_frontend(frontend::ServerPacket::SetTime { time: SIGN_IN_TIME });

        let pending = self.bridge.pending_authentications();
        let (task, created) = pending.get_or_create(&xuid, Instant::now());
        if !created {
            tracing::debug!("Reusing pending login for {}", self.display_name());
        }
        task.set_online(true);
        self.connection.set_auth_task(Some(Arc::clone(&task)));

        if let Some(result) = task.result() {
            self.resume(ResumeEvent::DeviceLoginFinished(result));
            return;
        }
        if task.begin() {
            tokio::spawn(Arc::clone(&task).drive(Arc::clone(self.bridge.credentials())));
        }

        let code = task.wait_for_code();
        self.spawn_resume(async move { ResumeEvent::DeviceCodeIssued(code.await) });
        let result = task.wait_for_result();
        self.spawn_resume(async move { ResumeEvent::DeviceLoginFinished(result.await) });
    }

    /// Continues a login with the outcome of an asynchronous step.
    pub fn resume(&mut self, event: ResumeEvent) {
        if self.is_closed() {
            tracing::trace!("Ignoring {} for closed session", event.as_ref());
            return;
        }
        match event {
            ResumeEvent::CredentialsReady(credentials) => self.on_credentials(credentials),
            ResumeEvent::RefreshFailed(error) => self.on_refresh_failed(error),
            ResumeEvent::DeviceCodeIssued(Ok(code)) => self.show_device_code(code),
            // The result waiter reports the failure.
            ResumeEvent::DeviceCodeIssued(Err(_)) => {}
            ResumeEvent::DeviceLoginFinished(result) => self.on_device_login_finished(result),
            ResumeEvent::BackendLinkOpened { generation, result } => {
                self.on_backend_link(generation, result);
            }
        }
    }

    fn on_credentials(&mut self, credentials: Credentials) {
        if self.phase() != ConnectionPhase::Authenticating {
            tracing::debug!("Credentials arrived in phase {}", self.phase());
            return;
        }
        if let (Some(token), Some(identity)) = (&credentials.refresh_token, &self.identity) {
            self.bridge
                .refresh_tokens()
                .store(&identity.xuid, token.clone());
        }
        self.connection.set_credentials(credentials);
        self.connect_downstream();
    }

    /// Spawns the player so the prompt has a world to appear in, then
    /// offers to sign in again.
    fn on_refresh_failed(&mut self, error: AuthError) {
        if self.phase() != ConnectionPhase::Authenticating {
            return;
        }
        tracing::warn!("Refresh token of {} was rejected: {error}", self.display_name());
        if let Some(identity) = &self.identity {
            self.bridge.refresh_tokens().remove(&identity.xuid);
        }
        self.connection.set_logging_in(false);
        if !self.set_phase(ConnectionPhase::Spawned) {
            return;
        }
        self.spawn();

        let form = Form {
            title: self.translate(keys::TOKEN_EXPIRED_TITLE, &[]),
            content: self.translate(keys::TOKEN_EXPIRED_BODY, &[&error.to_string()]),
            buttons: vec![
                self.translate(keys::RETRY, &[]),
                self.translate(keys::DISCONNECT, &[]),
            ],
        };
        self.show_form(form, |session, response| match response {
            Some(0) => session.authenticate_with_device_code(),
            _ => {
                let reason = session.translate(keys::LOGIN_CANCELLED, &[]);
                session.disconnect(&reason);
            }
        });
    }

    fn show_device_code(&mut self, code: DeviceCode) {
        if self.phase() != ConnectionPhase::Authenticating {
            return;
        }
        tracing::info!(
            "{} must sign in at {} with code {}",
            self.display_name(),
            code.verification_uri,
            code.user_code
        );
        let form = Form {
            title: self.translate(keys::DEVICE_CODE_TITLE, &[]),
            content: self.translate(
                keys::DEVICE_CODE_BODY,
                &[&code.verification_uri, &code.user_code],
            ),
            buttons: vec![self.translate(keys::DISCONNECT, &[])],
        };
        self.show_form(form, move |session, response| match response {
            Some(_) => {
                let reason = session.translate(keys::LOGIN_CANCELLED, &[]);
                session.disconnect(&reason);
            }
            // Closing the form must not hide the code.
            None => session.show_device_code(code),
        });
    }

    fn on_device_login_finished(&mut self, result: Result<Credentials, AuthError>) {
        if let Some(task) = self.connection.auth_task().cloned() {
            self.bridge.pending_authentications().cleanup(&task);
            self.connection.set_auth_task(None);
        }
        if self.phase() != ConnectionPhase::Authenticating {
            return;
        }
        match result {
            Ok(credentials) => {
                self.caches.forms.clear();
                self.on_credentials(credentials);
            }
            Err(error) => {
                tracing::info!("Login of {} failed: {error}", self.display_name());
                let reason = match error {
                    AuthError::TimedOut => self.translate(keys::LOGIN_TIMED_OUT, &[]),
                    AuthError::NoProfile => self.translate(keys::INVALID_ACCOUNT, &[]),
                    error => error.to_string(),
                };
                self.disconnect(&reason);
            }
        }
    }
}
