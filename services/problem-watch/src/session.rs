//! Dashboard login and session liveness

use std::fmt;
use std::time::Duration;

use crate::config::DashboardConfig;
use crate::driver::SessionDriver;
use crate::error::WatchError;

const PAGE_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    /// Credentials accepted, not yet verified
    Authenticated,
    /// Logout affordance present and no unauthenticated marker
    Verified,
    Expired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "Unauthenticated"),
            SessionState::Authenticating => write!(f, "Authenticating"),
            SessionState::Authenticated => write!(f, "Authenticated"),
            SessionState::Verified => write!(f, "Verified"),
            SessionState::Expired => write!(f, "Expired"),
        }
    }
}

/// Why a session could not be established or kept alive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailureKind {
    TimeoutOrNavigation,
    Credentials,
    Unknown,
}

/// A classified session failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    pub kind: LoginFailureKind,
    pub detail: String,
}

impl LoginFailure {
    pub fn from_error(err: &WatchError) -> Self {
        Self {
            kind: classify(err),
            detail: err.to_string(),
        }
    }
}

impl fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            LoginFailureKind::TimeoutOrNavigation => "timeout or navigation failure",
            LoginFailureKind::Credentials => "credentials rejected",
            LoginFailureKind::Unknown => "unknown session failure",
        };
        write!(f, "{}: {}", label, self.detail)
    }
}

/// Map an error raised during login or navigation to a failure kind
pub fn classify(err: &WatchError) -> LoginFailureKind {
    match err {
        WatchError::Timeout(_) | WatchError::Navigation(_) => {
            LoginFailureKind::TimeoutOrNavigation
        }
        WatchError::CredentialsRejected(_) => LoginFailureKind::Credentials,
        WatchError::Session(failure) => failure.kind,
        other => {
            let text = other.to_string().to_lowercase();
            if text.contains("timeout") || text.contains("navigation") {
                LoginFailureKind::TimeoutOrNavigation
            } else if text.contains("invalid credentials") || text.contains("login failed") {
                LoginFailureKind::Credentials
            } else {
                LoginFailureKind::Unknown
            }
        }
    }
}

/// Logs in to the dashboard through a session driver
#[derive(Debug)]
pub struct SessionManager<'a> {
    config: &'a DashboardConfig,
}

impl<'a> SessionManager<'a> {
    pub fn new(config: &'a DashboardConfig) -> Self {
        Self { config }
    }

    /// Log in and verify the session
    pub async fn establish<'d>(
        &self,
        driver: &'d dyn SessionDriver,
    ) -> Result<Session<'d>, LoginFailure>
    where
        'a: 'd,
    {
        let mut session = Session {
            driver,
            config: self.config,
            state: SessionState::Unauthenticated,
        };

        match session.login().await {
            Ok(()) => {
                tracing::info!("Dashboard session verified");
                Ok(session)
            }
            Err(e) => {
                let failure = LoginFailure::from_error(&e);
                tracing::error!("Login failed: {}", failure);
                Err(failure)
            }
        }
    }
}

/// An authenticated dashboard session
pub struct Session<'d> {
    driver: &'d dyn SessionDriver,
    config: &'d DashboardConfig,
    state: SessionState,
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .finish()
    }
}

impl<'d> Session<'d> {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn driver(&self) -> &'d dyn SessionDriver {
        self.driver
    }

    fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.config.navigation_timeout_ms)
    }

    fn on_login_page(&self, url: &str) -> bool {
        self.config
            .login_url_markers
            .iter()
            .any(|marker| url.contains(marker.as_str()))
    }

    async fn login(&mut self) -> crate::Result<()> {
        let config = self.config;
        let selectors = &config.selectors;
        self.state = SessionState::Authenticating;

        tracing::info!("Opening login page {}", config.login_url);
        self.driver.goto(&config.login_url, self.nav_timeout()).await?;
        self.driver
            .wait_for_selector(
                &selectors.username_field,
                Duration::from_millis(config.login_form_timeout_ms),
            )
            .await?;

        self.driver
            .type_text(&selectors.username_field, &config.username)
            .await?;
        self.driver
            .type_text(&selectors.password_field, &config.password)
            .await?;
        self.driver.click(&selectors.submit).await?;
        self.driver.wait_for_navigation(self.nav_timeout()).await?;

        if self.driver.has_element(&selectors.error_indicator).await? {
            return Err(WatchError::CredentialsRejected(
                "dashboard displayed a login error".to_string(),
            ));
        }

        let url = self.driver.current_url().await?;
        if self.on_login_page(&url) {
            return Err(WatchError::CredentialsRejected(format!(
                "still on login page after submit ({})",
                url
            )));
        }
        if !self.driver.has_element(&selectors.logout_link).await? {
            return Err(WatchError::SessionExpired(
                "logout link not present after login".to_string(),
            ));
        }
        self.state = SessionState::Authenticated;
        tracing::debug!("Credentials accepted, now at {}", url);

        match self.driver.cookies().await {
            Ok(names) => tracing::debug!("Session cookies: {}", names.join(", ")),
            Err(e) => tracing::debug!("Could not read cookies: {}", e),
        }

        tokio::time::sleep(Duration::from_millis(config.settle_delay_ms)).await;
        self.check_markers().await?;

        self.state = SessionState::Verified;
        Ok(())
    }

    async fn check_markers(&mut self) -> crate::Result<()> {
        let text = self.driver.evaluate(PAGE_TEXT_SCRIPT).await?;
        let text = text.as_str().unwrap_or_default();
        if let Some(marker) = self
            .config
            .unauthenticated_markers
            .iter()
            .find(|m| text.contains(m.as_str()))
        {
            self.state = SessionState::Expired;
            return Err(WatchError::SessionExpired(format!(
                "page reports \"{}\"",
                marker
            )));
        }
        Ok(())
    }

    /// Fail when the current page shows the session is gone
    pub async fn check_liveness(&mut self) -> crate::Result<()> {
        if !self
            .driver
            .has_element(&self.config.selectors.logout_link)
            .await?
        {
            self.state = SessionState::Expired;
            return Err(WatchError::SessionExpired(
                "logout link no longer present".to_string(),
            ));
        }
        self.check_markers().await
    }

    /// Navigate within the session, failing if it was redirected to login
    pub async fn navigate(&mut self, url: &str) -> crate::Result<()> {
        self.driver.goto(url, self.nav_timeout()).await?;

        let current = self.driver.current_url().await?;
        if current != url && self.on_login_page(&current) {
            self.state = SessionState::Expired;
            return Err(WatchError::SessionExpired(format!(
                "redirected to {}",
                current
            )));
        }

        self.check_liveness().await
    }
}
