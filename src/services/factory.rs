use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    auth::AuthService,
    config::AppConfig,
    errors::ServiceError,
    services::{
        accounts::AccountsService,
        assistant::{build_assistant, ChatAssistant},
        dashboard::DashboardService,
        festival_sales::FestivalSalesService,
        notifications::{build_notifier, Notifier},
        otp::{build_otp_store, OtpStore},
        products::ProductService,
    },
};

/// Builds services from configuration and shared dependencies
pub struct ServiceFactory {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    config: AppConfig,
}

impl ServiceFactory {
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>, config: AppConfig) -> Self {
        Self { db, auth, config }
    }

    pub fn product_service(&self) -> ProductService {
        ProductService::new(self.db.clone())
    }

    pub fn festival_sales_service(&self) -> FestivalSalesService {
        FestivalSalesService::new(&self.config.forecast)
    }

    /// Accounts with backends picked from config.
    pub fn accounts_service(&self) -> Result<AccountsService, ServiceError> {
        let otp_store = build_otp_store(&self.config.otp, &self.config.redis_url)?;
        let notifier = build_notifier(&self.config.notifications, self.config.otp.ttl_secs)?;
        Ok(self.accounts_service_with(otp_store, notifier))
    }

    pub fn accounts_service_with(
        &self,
        otp_store: Arc<dyn OtpStore>,
        notifier: Arc<dyn Notifier>,
    ) -> AccountsService {
        AccountsService::new(
            self.db.clone(),
            otp_store,
            notifier,
            self.auth.clone(),
            self.config.otp.clone(),
        )
    }

    pub fn assistant(&self) -> Arc<dyn ChatAssistant> {
        build_assistant(&self.config.assistant)
    }

    pub fn create_all(&self) -> Result<ServiceContainer, ServiceError> {
        let accounts = self.accounts_service()?;
        Ok(self.container(accounts, self.assistant()))
    }

    /// Container around an accounts service and assistant supplied by the caller.
    pub fn container(
        &self,
        accounts: AccountsService,
        assistant: Arc<dyn ChatAssistant>,
    ) -> ServiceContainer {
        let products = self.product_service();
        ServiceContainer {
            dashboard: Arc::new(DashboardService::new(products.clone(), accounts.clone())),
            products: Arc::new(products),
            accounts: Arc::new(accounts),
            festival_sales: Arc::new(self.festival_sales_service()),
            assistant,
        }
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub accounts: Arc<AccountsService>,
    pub products: Arc<ProductService>,
    pub dashboard: Arc<DashboardService>,
    pub festival_sales: Arc<FestivalSalesService>,
    pub assistant: Arc<dyn ChatAssistant>,
}
