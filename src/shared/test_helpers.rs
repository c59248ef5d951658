#[cfg(test)]
use crate::features::auth::model::{AuthenticatedUser, Role};

#[cfg(test)]
use axum::{extract::Request, middleware::Next, Router};

#[cfg(test)]
pub fn create_admin_user() -> AuthenticatedUser {
    AuthenticatedUser {
        sub: "admin-sub".to_string(),
        name: "Helpdesk Admin".to_string(),
        role: Role::Admin,
    }
}

#[cfg(test)]
pub fn create_regular_user(sub: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        sub: sub.to_string(),
        name: format!("User {}", sub),
        role: Role::User,
    }
}

/// Wrap a router so every request runs as `user`, bypassing JWT validation
#[cfg(test)]
pub fn with_user(router: Router, user: AuthenticatedUser) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
        },
    ))
}
