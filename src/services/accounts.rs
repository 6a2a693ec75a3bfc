use crate::{
    auth::{hash_password, verify_password, AuthService, AuthUser, IssuedToken},
    config::OtpConfig,
    entities::account::{self, Entity as AccountEntity, Role},
    errors::ServiceError,
    services::{
        notifications::Notifier,
        otp::{generate_code, otp_key, OtpEntry, OtpStore, PendingRegistration},
    },
};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const TEMPORARY_PASSWORD_LEN: usize = 12;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegistrationRequest {
    #[validate(length(min = 1, max = 30, message = "Full name must be 1-30 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid e-mail address"))]
    pub email: String,
    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid e-mail address"))]
    pub email: String,
    #[validate(length(min = 1, message = "OTP is required"))]
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddStaffRequest {
    #[validate(length(min = 1, max = 14, message = "First name must be 1-14 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 15, message = "Last name must be 1-15 characters"))]
    pub last_name: String,
    #[validate(email(message = "Invalid e-mail address"))]
    pub email: String,
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub username: String,
}

impl From<account::Model> for AccountResponse {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            role: model.role,
            full_name: model.full_name,
            email: model.email,
            username: model.username,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OtpDispatched {
    pub email: String,
    /// Seconds until the code expires
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub account: AccountResponse,
    #[serde(flatten)]
    pub token: IssuedToken,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StaffMember {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StaffSummary {
    pub managers: u64,
    pub cashiers: u64,
    pub total_active_staff: u64,
}

/// New cashier plus the one-time temporary password
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewStaffMember {
    pub staff: StaffMember,
    pub temporary_password: String,
}

impl From<account::Model> for StaffMember {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            name: model.full_name,
            email: model.email,
            role: model.role,
        }
    }
}

/// Registration, login and staff management
#[derive(Clone)]
pub struct AccountsService {
    db: Arc<DatabaseConnection>,
    otp_store: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    auth: Arc<AuthService>,
    otp_config: OtpConfig,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AccountsService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        otp_store: Arc<dyn OtpStore>,
        notifier: Arc<dyn Notifier>,
        auth: Arc<AuthService>,
        otp_config: OtpConfig,
    ) -> Self {
        Self {
            db,
            otp_store,
            notifier,
            auth,
            otp_config,
        }
    }

    async fn ensure_available(
        &self,
        role: Role,
        email: &str,
        username: &str,
    ) -> Result<(), ServiceError> {
        let email_taken = AccountEntity::find()
            .filter(account::Column::Role.eq(role))
            .filter(account::Column::Email.eq(email))
            .count(&*self.db)
            .await?
            > 0;
        if email_taken {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let username_taken = AccountEntity::find()
            .filter(account::Column::Role.eq(role))
            .filter(account::Column::Username.eq(username))
            .count(&*self.db)
            .await?
            > 0;
        if username_taken {
            return Err(ServiceError::Conflict("Username already taken".to_string()));
        }

        Ok(())
    }

    /// Validate a registration, park it with a fresh code and e-mail the code.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn request_registration_otp(
        &self,
        role: Role,
        request: RegistrationRequest,
    ) -> Result<OtpDispatched, ServiceError> {
        request.validate()?;
        if request.password != request.confirm_password {
            return Err(ServiceError::ValidationError(
                "Passwords do not match".to_string(),
            ));
        }

        let email = normalize_email(&request.email);
        let username = request.username.trim().to_string();
        self.ensure_available(role, &email, &username).await?;

        let registration = PendingRegistration {
            role,
            full_name: request.full_name.trim().to_string(),
            email: email.clone(),
            username,
            password_hash: hash_password(&request.password)?,
        };
        let code = generate_code(self.otp_config.length);
        let key = otp_key(&self.otp_config.namespace, role, &email);
        let entry = OtpEntry::new(code.clone(), registration, self.otp_config.ttl_secs);
        self.otp_store.put(&key, &entry).await?;

        if !self.notifier.send_otp(&email, &code, role).await {
            self.otp_store.remove(&key).await?;
            return Err(ServiceError::ExternalServiceError(
                "Could not send verification e-mail".to_string(),
            ));
        }

        info!(%role, "registration otp sent");
        Ok(OtpDispatched {
            email,
            expires_in: self.otp_config.ttl_secs,
        })
    }

    /// Check the code and create the account on success.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn verify_registration(
        &self,
        role: Role,
        request: VerifyOtpRequest,
    ) -> Result<account::Model, ServiceError> {
        request.validate()?;
        let email = normalize_email(&request.email);
        let key = otp_key(&self.otp_config.namespace, role, &email);

        let Some(entry) = self.otp_store.get(&key).await? else {
            return Err(ServiceError::BadRequest(
                "OTP expired or not found. Request a new code.".to_string(),
            ));
        };

        // claimed before comparing: at most max_attempts guesses reach the code
        let attempt = self.otp_store.record_attempt(&key, &entry).await?;
        let exhausted = || {
            ServiceError::BadRequest("Too many incorrect attempts. Request a new code.".to_string())
        };
        if attempt > self.otp_config.max_attempts {
            self.otp_store.remove(&key).await?;
            return Err(exhausted());
        }
        if entry.code != request.otp.trim() {
            if attempt >= self.otp_config.max_attempts {
                self.otp_store.remove(&key).await?;
                warn!(%role, "otp attempts exhausted");
                return Err(exhausted());
            }
            return Err(ServiceError::BadRequest("Invalid OTP".to_string()));
        }

        let registration = entry.registration;
        self.ensure_available(role, &registration.email, &registration.username)
            .await?;

        let account = account::ActiveModel {
            id: Set(Uuid::new_v4()),
            role: Set(role),
            full_name: Set(registration.full_name),
            email: Set(registration.email),
            username: Set(registration.username),
            password_hash: Set(registration.password_hash),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.otp_store.remove(&key).await?;
        info!(%role, account_id = %account.id, "account registered");
        Ok(account)
    }

    /// Unknown user and wrong password fail identically.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(
        &self,
        role: Role,
        request: LoginRequest,
    ) -> Result<LoginResponse, ServiceError> {
        request.validate()?;
        let invalid = || ServiceError::Unauthorized("Invalid username or password".to_string());

        let account = AccountEntity::find()
            .filter(account::Column::Role.eq(role))
            .filter(account::Column::Username.eq(request.username.trim()))
            .one(&*self.db)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &account.password_hash)? {
            return Err(invalid());
        }

        let token = self
            .auth
            .issue_token(&account)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        info!(%role, account_id = %account.id, "login succeeded");
        Ok(LoginResponse {
            account: account.into(),
            token,
        })
    }

    pub async fn logout(&self, user: &AuthUser) {
        self.auth.revoke_token(&user.token_id, user.expires_at).await;
    }

    /// Create an account directly, without OTP.
    #[instrument(skip(self, password))]
    pub async fn create_account(
        &self,
        role: Role,
        full_name: &str,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<account::Model, ServiceError> {
        let email = normalize_email(email);
        let username = username.trim().to_string();
        self.ensure_available(role, &email, &username).await?;

        let candidate = account::Model {
            id: Uuid::new_v4(),
            role,
            full_name: full_name.trim().to_string(),
            email,
            username,
            password_hash: hash_password(password)?,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        candidate.validate()?;

        let account = account::ActiveModel {
            id: Set(candidate.id),
            role: Set(candidate.role),
            full_name: Set(candidate.full_name),
            email: Set(candidate.email),
            username: Set(candidate.username),
            password_hash: Set(candidate.password_hash),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        Ok(account)
    }

    /// Managers and cashiers, newest first.
    pub async fn list_staff(&self) -> Result<Vec<StaffMember>, ServiceError> {
        let staff = AccountEntity::find()
            .filter(
                Condition::any()
                    .add(account::Column::Role.eq(Role::Manager))
                    .add(account::Column::Role.eq(Role::Cashier)),
            )
            .order_by_desc(account::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(staff.into_iter().map(StaffMember::from).collect())
    }

    pub async fn staff_summary(&self) -> Result<StaffSummary, ServiceError> {
        let managers = self.count_role(Role::Manager).await?;
        let cashiers = self.count_role(Role::Cashier).await?;
        Ok(StaffSummary {
            managers,
            cashiers,
            total_active_staff: managers + cashiers,
        })
    }

    pub async fn count_role(&self, role: Role) -> Result<u64, ServiceError> {
        Ok(AccountEntity::find()
            .filter(account::Column::Role.eq(role))
            .count(&*self.db)
            .await?)
    }

    /// Add a cashier whose username is the e-mail's local part.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn add_cashier(&self, request: AddStaffRequest) -> Result<NewStaffMember, ServiceError> {
        request.validate()?;
        let email = normalize_email(&request.email);
        let username = email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string();
        let full_name = format!("{} {}", request.first_name.trim(), request.last_name.trim());

        let temporary_password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMPORARY_PASSWORD_LEN)
            .map(char::from)
            .collect();

        let account = self
            .create_account(Role::Cashier, &full_name, &email, &username, &temporary_password)
            .await?;

        Ok(NewStaffMember {
            staff: account.into(),
            temporary_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::services::otp::InMemoryOtpStore;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CapturingNotifier {
        codes: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn send_otp(&self, _email: &str, code: &str, _role: Role) -> bool {
            self.codes.lock().unwrap().push(code.to_string());
            !self.fail
        }
    }

    async fn setup(fail_notifier: bool) -> (AccountsService, Arc<CapturingNotifier>) {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        crate::migrator::Migrator::up(&db, None).await.unwrap();

        let notifier = Arc::new(CapturingNotifier {
            fail: fail_notifier,
            ..Default::default()
        });
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            "accounts-test-secret-accounts-test-secret-accounts-test-secret-1".into(),
            "retailx-api".into(),
            "retailx-auth".into(),
            Duration::from_secs(900),
        )));
        let service = AccountsService::new(
            Arc::new(db),
            Arc::new(InMemoryOtpStore::new()),
            notifier.clone(),
            auth,
            OtpConfig {
                max_attempts: 2,
                ..OtpConfig::default()
            },
        );
        (service, notifier)
    }

    fn registration(email: &str, username: &str) -> RegistrationRequest {
        RegistrationRequest {
            full_name: "Asha Verma".into(),
            email: email.into(),
            username: username.into(),
            password: "diwali-lights".into(),
            confirm_password: "diwali-lights".into(),
        }
    }

    fn last_code(notifier: &CapturingNotifier) -> String {
        notifier.codes.lock().unwrap().last().cloned().unwrap()
    }

    #[tokio::test]
    async fn register_verify_then_login() {
        let (service, notifier) = setup(false).await;
        service
            .request_registration_otp(Role::Manager, registration("Asha@Example.com", "asha"))
            .await
            .unwrap();

        let code = last_code(&notifier);
        let account = service
            .verify_registration(
                Role::Manager,
                VerifyOtpRequest {
                    email: "asha@example.com".into(),
                    otp: code.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(account.email, "asha@example.com");
        assert_eq!(account.role, Role::Manager);

        // code is single use
        assert_matches!(
            service
                .verify_registration(
                    Role::Manager,
                    VerifyOtpRequest {
                        email: "asha@example.com".into(),
                        otp: code,
                    },
                )
                .await,
            Err(ServiceError::BadRequest(_))
        );

        let login = service
            .login(
                Role::Manager,
                LoginRequest {
                    username: "asha".into(),
                    password: "diwali-lights".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(login.token.token_type, "Bearer");

        // same credentials under another role do not exist
        assert_matches!(
            service
                .login(
                    Role::Cashier,
                    LoginRequest {
                        username: "asha".into(),
                        password: "diwali-lights".into(),
                    },
                )
                .await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected() {
        let (service, _) = setup(false).await;
        let mut request = registration("a@example.com", "asha");
        request.confirm_password = "something-else".into();
        assert_matches!(
            service.request_registration_otp(Role::Cashier, request).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn notifier_failure_is_bad_gateway_and_discards_code() {
        let (service, notifier) = setup(true).await;
        let err = service
            .request_registration_otp(Role::Cashier, registration("a@example.com", "asha"))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ExternalServiceError(_));

        let code = last_code(&notifier);
        assert_matches!(
            service
                .verify_registration(
                    Role::Cashier,
                    VerifyOtpRequest {
                        email: "a@example.com".into(),
                        otp: code,
                    },
                )
                .await,
            Err(ServiceError::BadRequest(msg)) if msg.starts_with("OTP expired")
        );
    }

    #[tokio::test]
    async fn wrong_codes_exhaust_attempts() {
        let (service, notifier) = setup(false).await;
        service
            .request_registration_otp(Role::Cashier, registration("b@example.com", "bina"))
            .await
            .unwrap();
        let code = last_code(&notifier);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let verify = |otp: &str| VerifyOtpRequest {
            email: "b@example.com".into(),
            otp: otp.into(),
        };
        assert_matches!(
            service.verify_registration(Role::Cashier, verify(wrong)).await,
            Err(ServiceError::BadRequest(msg)) if msg == "Invalid OTP"
        );
        assert_matches!(
            service.verify_registration(Role::Cashier, verify(wrong)).await,
            Err(ServiceError::BadRequest(msg)) if msg.starts_with("Too many")
        );
        // even the right code is gone now
        assert!(service
            .verify_registration(Role::Cashier, verify(&code))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn concurrent_wrong_codes_share_one_attempt_budget() {
        let (service, notifier) = setup(false).await;
        service
            .request_registration_otp(Role::Cashier, registration("c@example.com", "chetan"))
            .await
            .unwrap();
        let code = last_code(&notifier);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let guesses = (0..20).map(|_| {
            service.verify_registration(
                Role::Cashier,
                VerifyOtpRequest {
                    email: "c@example.com".into(),
                    otp: wrong.into(),
                },
            )
        });
        let results = futures::future::join_all(guesses).await;

        let invalid = results
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::BadRequest(msg)) if msg == "Invalid OTP"))
            .count();
        // max_attempts is 2: one plain rejection, then the code is burned
        assert_eq!(invalid, 1);
        assert!(results.iter().all(Result::is_err));
        assert!(service
            .verify_registration(
                Role::Cashier,
                VerifyOtpRequest {
                    email: "c@example.com".into(),
                    otp: code,
                },
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn duplicate_email_in_same_role_conflicts() {
        let (service, _) = setup(false).await;
        service
            .create_account(Role::Cashier, "Ravi", "ravi@example.com", "ravi", "password1")
            .await
            .unwrap();

        assert_matches!(
            service
                .request_registration_otp(Role::Cashier, registration("RAVI@example.com", "ravi2"))
                .await,
            Err(ServiceError::Conflict(_))
        );
        // another role may reuse the e-mail
        assert!(service
            .request_registration_otp(Role::Manager, registration("ravi@example.com", "ravi"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn add_cashier_returns_usable_temporary_password() {
        let (service, _) = setup(false).await;
        let created = service
            .add_cashier(AddStaffRequest {
                first_name: "Kiran".into(),
                last_name: "Rao".into(),
                email: "kiran.rao@example.com".into(),
            })
            .await
            .unwrap();
        assert_eq!(created.staff.username, "kiran.rao");
        assert_eq!(created.staff.name, "Kiran Rao");

        let login = service
            .login(
                Role::Cashier,
                LoginRequest {
                    username: "kiran.rao".into(),
                    password: created.temporary_password,
                },
            )
            .await;
        assert!(login.is_ok());

        let summary = service.staff_summary().await.unwrap();
        assert_eq!(summary.cashiers, 1);
        assert_eq!(summary.total_active_staff, 1);
        assert_eq!(service.list_staff().await.unwrap().len(), 1);
    }
}
