//! Authentication service models

pub mod user;

pub use user::{
    GoogleCallbackQuery, LoginRequest, NewUser, RefreshTokenRequest, RegisterRequest,
    RegisterResponse, TokenResponse, User,
};
