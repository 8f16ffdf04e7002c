//! Startup seeding: warden's own actions, the admin role and, when
//! configured, an initial administrator. Safe to run on every start.

use tokio_util::sync::CancellationToken;

use warden_auth::actions::builtin;
use warden_auth::{Action, NewAction, NewRole, NewUser, Role, User};
use warden_core::{ServiceError, ServiceResult};

use super::Services;
use crate::config::BootstrapAdmin;

pub const ADMIN_ROLE: &str = "admin";

pub async fn bootstrap(
    services: &Services,
    admin: Option<&BootstrapAdmin>,
    cancel: &CancellationToken,
) -> ServiceResult<()> {
    let role = admin_role(services, cancel).await?;
    for name in builtin::ALL {
        let action = builtin_action(services, name, cancel).await?;
        tolerate_existing(services.grants.grant_role_action(role.id, action.id, cancel).await)?;
    }

    if let Some(admin) = admin {
        let user = admin_user(services, admin, cancel).await?;
        tolerate_existing(services.grants.assign_role(user.id, role.id, cancel).await)?;
        tracing::info!(user_id = %user.id, username = %user.username, "bootstrap administrator ready");
    }
    Ok(())
}

async fn admin_role(services: &Services, cancel: &CancellationToken) -> ServiceResult<Role> {
    match services.roles.get_by_name(ADMIN_ROLE, cancel).await {
        Err(ServiceError::DataNotFound) => {
            let input = NewRole {
                name: ADMIN_ROLE.to_string(),
                description: "Full access to warden administration".to_string(),
                active: true,
            };
            services.roles.create(input, cancel).await
        }
        found => found,
    }
}

async fn builtin_action(services: &Services, name: &str, cancel: &CancellationToken) -> ServiceResult<Action> {
    match services.actions.get_by_name(name, cancel).await {
        Err(ServiceError::DataNotFound) => {
            let input = NewAction {
                name: name.to_string(),
                description: String::new(),
                active: true,
            };
            services.actions.create(input, cancel).await
        }
        found => found,
    }
}

async fn admin_user(services: &Services, admin: &BootstrapAdmin, cancel: &CancellationToken) -> ServiceResult<User> {
    match services.users.get_by_username(&admin.username, cancel).await {
        Err(ServiceError::DataNotFound) => {
            let input = NewUser {
                full_name: "Administrator".to_string(),
                username: admin.username.clone(),
                email: admin.email.clone(),
                password: admin.password.clone(),
                active: true,
                verified: true,
            };
            services.users.create(input, cancel).await
        }
        found => found,
    }
}

fn tolerate_existing<T>(result: ServiceResult<T>) -> ServiceResult<()> {
    match result {
        Ok(_) | Err(ServiceError::DuplicateData(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_auth::{Argon2Hasher, RequestMetadata, require_action};
    use warden_core::SystemClock;

    use crate::config::WardenConfig;
    use crate::store::InMemoryStore;

    fn services() -> Services {
        Services::with_hasher(
            Arc::new(InMemoryStore::new()),
            &WardenConfig::default(),
            Arc::new(SystemClock),
            Arc::new(Argon2Hasher::with_params(256, 1).unwrap()),
        )
    }

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            username: "root".into(),
            email: "root@example.com".into(),
            password: "bootstrap-password".into(),
        }
    }

    #[tokio::test]
    async fn seeded_admin_holds_every_builtin_action() {
        let services = services();
        let cancel = CancellationToken::new();
        bootstrap(&services, Some(&admin()), &cancel).await.unwrap();

        let issued = services
            .auth
            .login("root", "bootstrap-password", RequestMetadata::default(), &cancel)
            .await
            .unwrap();
        let claims = services.authenticator.authenticate(&issued.access_token).unwrap();
        for action in builtin::ALL {
            require_action(Some(&claims), action).unwrap();
        }
        assert_eq!(claims.roles, vec![ADMIN_ROLE]);
    }

    #[tokio::test]
    async fn running_twice_changes_nothing() {
        let services = services();
        let cancel = CancellationToken::new();
        bootstrap(&services, Some(&admin()), &cancel).await.unwrap();
        let first = services.users.get_by_username("root", &cancel).await.unwrap();

        bootstrap(&services, Some(&admin()), &cancel).await.unwrap();
        assert_eq!(services.users.get_by_username("root", &cancel).await.unwrap(), first);
        let role = services.roles.get_by_name(ADMIN_ROLE, &cancel).await.unwrap();
        let permissions = services.resolver.resolve(first.id, &cancel).await.unwrap();
        assert_eq!(permissions.actions.len(), builtin::ALL.len());
        assert_eq!(permissions.roles, vec![role.name]);
    }

    #[tokio::test]
    async fn without_admin_only_catalog_is_seeded() {
        let services = services();
        let cancel = CancellationToken::new();
        bootstrap(&services, None, &cancel).await.unwrap();

        assert!(services.roles.get_by_name(ADMIN_ROLE, &cancel).await.is_ok());
        assert!(services.actions.get_by_name(builtin::GRANTS_WRITE, &cancel).await.is_ok());
    }
}
