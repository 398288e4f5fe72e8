mod handlers;
mod types;

pub use handlers::{admin_dashboard, login, logout, me, register, resend_code, verify_email};
pub use types::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
    ResendCodeRequest, ResendCodeResponse, UserResponse, UserWrapper, VerifyEmailRequest,
};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{
    __path_admin_dashboard, __path_login, __path_logout, __path_me, __path_register,
    __path_resend_code, __path_verify_email,
};
