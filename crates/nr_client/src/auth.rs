use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nr_core::storage::{AUTH_TOKEN_KEY, AUTH_USER_KEY};
use nr_core::{ClientStorage, Credentials, Logger, NewsApi, RawResponse, Registration, User};
use serde_json::{json, Value};

use crate::flag::BusyFlag;
use crate::persist::Mirror;

pub const INVALID_CREDENTIALS: &str = "Невірний логін або пароль.";
pub const EMPTY_RESPONSE: &str = "Порожня відповідь від сервера.";
pub const INCOMPLETE_RESPONSE: &str = "Неповна відповідь від сервера.";
pub const NO_RESPONSE: &str = "Не отримано відповіді від сервера.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

#[derive(Debug, Default)]
struct AuthState {
    session: Session,
    error: Option<String>,
}

/// Mock session: a token and the user it belongs to, mirrored to client
/// storage under `auth_token` and `auth_user`.
pub struct AuthStore {
    api: Arc<dyn NewsApi>,
    mirror: Mirror,
    logger: Logger,
    busy: BusyFlag,
    state: Mutex<AuthState>,
}

impl AuthStore {
    pub fn new(api: Arc<dyn NewsApi>, storage: Arc<dyn ClientStorage>, logger: Logger) -> Self {
        let logger = logger.with_prefix("[AuthStore]");
        Self {
            api,
            mirror: Mirror::new(storage, logger.clone()),
            logger,
            busy: BusyFlag::default(),
            state: Mutex::new(AuthState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_error(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.logger.warn("Auth request failed", json!({ "error": message }));
        self.lock().error = Some(message);
        false
    }

    /// Restores the session persisted by a previous run.
    pub fn init_auth(&self) {
        let Some(token) = self
            .mirror
            .read(AUTH_TOKEN_KEY)
            .filter(|token| !token.is_empty())
        else {
            return;
        };
        let user = self.mirror.read_json::<User>(AUTH_USER_KEY);
        self.logger.debug(
            "Restored session",
            json!({ "hasUser": user.is_some() }),
        );
        self.lock().session = Session {
            token: Some(token),
            user,
        };
    }

    pub async fn login(&self, credentials: &Credentials) -> bool {
        let Some(_busy) = self.busy.try_acquire() else {
            return false;
        };
        self.lock().error = None;

        let response = match self.api.login(credentials).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.log_error(&e, json!({ "operation": "login" }));
                return self.set_error(format!("Помилка під час запиту: {}", e.user_message()));
            }
        };
        let body = response.json();

        if response.status == 401 {
            return self.set_error(INVALID_CREDENTIALS);
        }
        if response.status >= 400 {
            return self.set_error(
                error_field(body.as_ref())
                    .unwrap_or_else(|| format!("Помилка запиту ({}).", response.status)),
            );
        }
        let Some(body) = body else {
            return self.set_error(EMPTY_RESPONSE);
        };

        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());
        let user = body
            .get("user")
            .filter(|u| !u.is_null())
            .and_then(|u| serde_json::from_value::<User>(u.clone()).ok());
        let (Some(token), Some(user)) = (token, user) else {
            return self.set_error(INCOMPLETE_RESPONSE);
        };

        self.mirror.write(AUTH_TOKEN_KEY, token);
        self.mirror.write_json(AUTH_USER_KEY, &user);
        self.logger
            .log_user_action("login", json!({ "userId": user.id, "email": user.email }));
        self.lock().session = Session {
            token: Some(token.to_string()),
            user: Some(user),
        };
        true
    }

    /// Creates an account. Does not log in.
    pub async fn register(&self, registration: &Registration) -> bool {
        let Some(_busy) = self.busy.try_acquire() else {
            return false;
        };
        self.lock().error = None;

        let response: RawResponse = match self.api.register(registration).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.log_error(&e, json!({ "operation": "register" }));
                return self.set_error(format!("Помилка під час запиту: {}", e.user_message()));
            }
        };
        let body = response.json();

        if response.status >= 400 {
            return self.set_error(
                error_field(body.as_ref())
                    .unwrap_or_else(|| format!("Помилка реєстрації ({}).", response.status)),
            );
        }
        let Some(body) = body else {
            return self.set_error(NO_RESPONSE);
        };
        if let Some(error) = error_field(Some(&body)) {
            return self.set_error(error);
        }

        self.logger
            .log_user_action("register", json!({ "email": registration.email }));
        true
    }

    pub fn logout(&self) {
        {
            let mut state = self.lock();
            state.session = Session::default();
            state.error = None;
        }
        self.mirror.remove(AUTH_TOKEN_KEY);
        self.mirror.remove(AUTH_USER_KEY);
        self.logger.log_user_action("logout", Value::Null);
    }

    /// Asks the server whether the held token is still valid. A rejected
    /// token ends the session; a transport failure keeps it.
    pub async fn check_token(&self) -> bool {
        let token = {
            let mut state = self.lock();
            match state.session.token.clone() {
                Some(token) => token,
                None => {
                    state.session.user = None;
                    return false;
                }
            }
        };

        let response = match self.api.check_token(&token).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.log_error(&e, json!({ "operation": "check_token" }));
                return false;
            }
        };

        if response.status >= 400 {
            if response.status == 401 || response.status == 403 {
                self.logout();
            }
            return false;
        }

        let valid = response
            .json()
            .and_then(|body| body.get("valid").and_then(Value::as_bool))
            .unwrap_or(false);
        if !valid {
            self.logout();
        }
        valid
    }

    pub fn session(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().session.token.is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.lock().session.user.clone()
    }

    pub fn username(&self) -> String {
        self.user().map(|u| u.username).unwrap_or_default()
    }

    pub fn user_avatar(&self) -> String {
        self.user().and_then(|u| u.avatar).unwrap_or_default()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|u| u.id)
    }

    pub fn is_loading(&self) -> bool {
        self.busy.is_set()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }
}

fn error_field(body: Option<&Value>) -> Option<String> {
    body?
        .get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}
