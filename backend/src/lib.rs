#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![warn(clippy::todo)]
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]

pub mod cfg {
    mod app_settings;
    mod database_settings;
    mod jwt_settings;
    mod oauth_settings;
    mod server_settings;

    pub use app_settings::*;
    pub use database_settings::*;
    pub use jwt_settings::*;
    pub use oauth_settings::*;
    pub use server_settings::*;
}

pub mod core {
    mod context;

    pub use context::*;
}

pub mod auth {
    mod jwt;
    mod password;
    mod tenant;

    pub use jwt::*;
    pub use password::*;
    pub use tenant::*;
}

pub mod db {
    mod memberships;
    mod namespaces;
    mod pool;
    mod profiles;
    mod scope;
    mod tenants;
    mod users;

    pub use memberships::*;
    pub use namespaces::*;
    pub use pool::*;
    pub use profiles::*;
    pub use scope::*;
    pub use tenants::*;
    pub use users::*;
}

pub mod services {
    pub mod onboarding;
    pub mod sso;
}

pub mod routes {
    pub mod auth;
    pub mod health;
    pub mod profile;
    pub mod users;
}

pub mod app {
    mod cli;
    mod router;
    mod server;

    pub use cli::*;
    pub use router::*;
    pub use server::*;
}

#[cfg(test)]
mod tests {
    mod jwt_tests;
    mod provisioning_tests;
    mod router_tests;
    mod slug_tests;
    mod tenant_tests;
}
