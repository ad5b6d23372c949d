//! HTTP request handlers for the identity API.

pub mod auth;
pub mod health;
pub mod roles;
pub mod users;

pub use auth::{
    login_handler, logout_handler, me_handler, refresh_handler, verify_otp_handler,
};
pub use health::{health_handler, readiness_handler};
pub use roles::{
    create_permission_handler, create_role_handler, delete_permission_handler,
    delete_role_handler, get_role_handler, list_permissions_handler, list_roles_handler,
    set_role_permissions_handler, update_role_handler,
};
pub use users::{
    change_password_handler, create_user_handler, delete_user_handler, get_user_handler,
    list_users_handler, set_user_roles_handler, update_user_handler,
};
