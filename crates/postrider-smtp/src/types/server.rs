//! Server descriptor and the credentials capability.

use std::sync::Arc;

use super::{AuthScheme, SchemeSupport};

/// Username/password pair handed to an authenticator.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Authentication username.
    pub username: String,
    /// Authentication password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the password must not leak through Debug-formatted logs
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Source of credentials, consulted lazily.
///
/// Authenticators ask for credentials the first time a round trip needs
/// them, not at construction, so a provider can defer to secure storage or
/// user interaction until authentication actually starts.
pub trait CredentialsProvider: Send + Sync {
    /// Produces the credentials for this session.
    fn credentials(&self) -> Credentials;
}

/// Provider backed by a fixed username/password pair.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    /// Creates a provider from a fixed pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Descriptor of the server one session talks to.
///
/// Everything except the advertised-scheme set is fixed at construction;
/// the engine fills in [`ServerProfile::supported`] once the EHLO reply
/// has been parsed.
#[derive(Clone)]
pub struct ServerProfile {
    hostname: String,
    port: u16,
    tls: bool,
    greeting: String,
    preferred: AuthScheme,
    supported: SchemeSupport,
    provider: Option<Arc<dyn CredentialsProvider>>,
}

impl ServerProfile {
    /// Creates a profile for an unauthenticated plaintext connection.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            tls: false,
            greeting: "localhost".to_string(),
            preferred: AuthScheme::None,
            supported: SchemeSupport::Unknown,
            provider: None,
        }
    }

    /// Selects implicit TLS for the connection.
    #[must_use]
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the name announced in the EHLO greeting.
    #[must_use]
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the preferred authentication scheme.
    #[must_use]
    pub fn preferred_scheme(mut self, scheme: AuthScheme) -> Self {
        self.preferred = scheme;
        self
    }

    /// Installs a static username/password credential source.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.provider = Some(Arc::new(StaticCredentials::new(username, password)));
        self
    }

    /// Installs a custom credential source.
    #[must_use]
    pub fn credentials_from(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// The server hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Whether the connection uses implicit TLS.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls
    }

    /// The name announced in the EHLO greeting.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        &self.greeting
    }

    /// The preferred authentication scheme.
    #[must_use]
    pub const fn preferred(&self) -> AuthScheme {
        self.preferred
    }

    /// The schemes detected from the EHLO reply.
    ///
    /// [`SchemeSupport::Unknown`] until the engine has seen the reply.
    #[must_use]
    pub const fn supported(&self) -> SchemeSupport {
        self.supported
    }

    /// The installed credential source, if any.
    #[must_use]
    pub fn credentials_provider(&self) -> Option<Arc<dyn CredentialsProvider>> {
        self.provider.clone()
    }

    pub(crate) const fn set_supported(&mut self, supported: SchemeSupport) {
        self.supported = supported;
    }
}

impl std::fmt::Debug for ServerProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProfile")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("preferred", &self.preferred)
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}
