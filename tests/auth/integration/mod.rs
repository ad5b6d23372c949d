mod test_authorization;
mod test_login_flow;
mod test_otp_flow;
mod test_refresh_rotation;
mod test_user_management;
