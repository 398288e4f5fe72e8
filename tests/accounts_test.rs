//! Verification codes, password hashing, sessions and mail composition.
//!
//! Run with: cargo test --test accounts_test

use chrono::{Duration, TimeZone, Utc};
use farm_data_api::auth::password::{PasswordError, hash_password_with_iterations};
use farm_data_api::auth::{AuthManager, AuthenticatedUser, verify_password};
use farm_data_api::entity::verification_requests;
use farm_data_api::routes::email::{SmtpOverride, TestMultipleRequest};
use farm_data_api::services::accounts::{
    IssuedCode, VerifyError, check_code, is_valid_email, normalize_email,
};
use farm_data_api::services::mail::{self, MailError, SmtpConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use uuid::Uuid;

fn request_for(issued: &IssuedCode) -> verification_requests::Model {
    verification_requests::Model {
        user_id: Uuid::nil(),
        code: Some(issued.code.clone()),
        expires_at: Some(issued.expires_at.into()),
        verified: false,
        issued_at: issued.issued_at.into(),
    }
}

fn issued_at_noon(code: &str) -> IssuedCode {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    IssuedCode {
        code: code.to_string(),
        issued_at: t,
        expires_at: t + Duration::minutes(10),
    }
}

#[test]
fn generated_codes_are_six_digits_valid_for_ttl() {
    let mut rng = StdRng::seed_from_u64(1);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    for _ in 0..50 {
        let issued = IssuedCode::generate(&mut rng, now, 10);
        assert_eq!(issued.code.len(), 6);
        assert!(issued.code.chars().all(|c| c.is_ascii_digit()));
        assert!(!issued.code.starts_with('0'));
        assert_eq!(issued.expires_at - issued.issued_at, Duration::minutes(10));
    }
}

#[test]
fn code_succeeds_before_expiry_and_fails_after() {
    let issued = issued_at_noon("482913");
    let request = request_for(&issued);

    assert!(check_code(&request, "482913", issued.issued_at + Duration::minutes(9)).is_ok());
    assert!(matches!(
        check_code(&request, "482913", issued.issued_at + Duration::minutes(11)),
        Err(VerifyError::Expired)
    ));
}

#[test]
fn wrong_code_is_incorrect_regardless_of_expiry() {
    let issued = issued_at_noon("482913");
    let request = request_for(&issued);

    for minutes in [1, 9, 11, 600] {
        assert!(matches!(
            check_code(&request, "000000", issued.issued_at + Duration::minutes(minutes)),
            Err(VerifyError::IncorrectCode)
        ));
    }
}

#[test]
fn reissued_code_replaces_the_previous_one() {
    let first = issued_at_noon("111111");
    let second = issued_at_noon("222222");
    let request = request_for(&second);
    let at = first.issued_at + Duration::minutes(1);

    assert!(matches!(
        check_code(&request, &first.code, at),
        Err(VerifyError::IncorrectCode)
    ));
    assert!(check_code(&request, &second.code, at).is_ok());
}

#[test]
fn cleared_code_never_verifies() {
    let issued = issued_at_noon("482913");
    let mut request = request_for(&issued);
    request.code = None;
    assert!(matches!(
        check_code(&request, "482913", issued.issued_at),
        Err(VerifyError::IncorrectCode)
    ));
}

#[test]
fn email_shape_validation() {
    assert!(is_valid_email("farmer@example.org"));
    assert!(is_valid_email("a.b+tag@sub.example.co.uk"));
    assert!(!is_valid_email("farmer.example.org"));
    assert!(!is_valid_email("farmer@localhost"));
    assert!(!is_valid_email("@example.org"));
    assert!(!is_valid_email("far mer@example.org"));
    assert!(!is_valid_email("a@b@example.org"));
    assert_eq!(normalize_email("  Farmer@Example.ORG "), "farmer@example.org");
}

#[test]
fn password_hash_verifies_only_the_original() {
    let hash = hash_password_with_iterations("correct horse", 1_000).unwrap();
    assert!(hash.starts_with("pbkdf2_sha256$1000$"));
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("battery staple", &hash));
    assert!(!verify_password("", &hash));

    let again = hash_password_with_iterations("correct horse", 1_000).unwrap();
    assert_ne!(hash, again, "salts must differ");
}

#[test]
fn malformed_hashes_never_match() {
    assert!(!verify_password("pw", ""));
    assert!(!verify_password("pw", "pbkdf2_sha256$0$AAAA$AAAA"));
    assert!(!verify_password("pw", "md5$1$AAAA$AAAA"));
    assert!(!verify_password("pw", "pbkdf2_sha256$ten$AAAA$AAAA"));
}

#[test]
fn blank_passwords_are_rejected() {
    assert_eq!(
        hash_password_with_iterations("   ", 10),
        Err(PasswordError::Blank)
    );
    assert_eq!(
        hash_password_with_iterations("pw", 0),
        Err(PasswordError::ZeroIterations)
    );
}

fn user() -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4(),
        email: "farmer@example.org".to_string(),
        is_staff: false,
    }
}

#[tokio::test]
async fn sessions_resolve_until_revoked() {
    let manager = AuthManager::new(24);
    let account = user();
    let (token, expires_at) = manager.issue(account.clone()).await;
    assert!(expires_at > Utc::now());
    assert_eq!(manager.resolve(&token).await, Some(account));

    assert!(manager.revoke(&token).await);
    assert!(!manager.revoke(&token).await);
    assert_eq!(manager.resolve(&token).await, None);
}

#[tokio::test]
async fn expired_sessions_are_pruned() {
    let manager = AuthManager::new(0);
    let (token, _) = manager.issue(user()).await;
    manager.issue(user()).await;
    assert_eq!(manager.prune_expired().await, 2);
    assert_eq!(manager.resolve(&token).await, None);
}

#[test]
fn verification_email_mentions_code_and_resend() {
    let expires = Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap();
    let first = mail::verification_email("482913", expires, 10, false);
    assert!(first.text.contains("482913"));
    assert!(first.text.contains("10 minutes"));
    assert!(first.html.contains("482913"));
    assert!(!first.text.contains("no longer valid"));

    let resend = mail::verification_email("551200", expires, 10, true);
    assert!(resend.subject.starts_with("New Verification Code"));
    assert!(resend.text.contains("no longer valid"));
}

#[tokio::test]
async fn unconfigured_smtp_is_reported() {
    let content = mail::test_email(None);
    let result = mail::send_with(&SmtpConfig::default(), "farmer@example.org", &content).await;
    assert!(matches!(result, Err(MailError::NotConfigured)));
}

#[test]
fn smtp_override_falls_back_to_server_settings() {
    let base = SmtpConfig {
        host: "mail.example.org".to_string(),
        username: "server".to_string(),
        ..SmtpConfig::default()
    };
    let merged = SmtpOverride {
        port: Some(465),
        ..SmtpOverride::default()
    }
    .apply(&base);
    assert_eq!(merged.host, "mail.example.org");
    assert_eq!(merged.port, 465);
    assert_eq!(merged.username, "server");
}

#[test]
fn alternate_account_needs_credentials() {
    let mut request = TestMultipleRequest {
        email: Some("farmer@example.org".to_string()),
        email_host: None,
        email_port: None,
        email_host_user: Some("sender@gmail.com".to_string()),
        email_host_password: None,
        default_from_email: None,
    };
    assert!(request.smtp_config().is_err());

    request.email_host_password = Some("app-password".to_string());
    let config = request.smtp_config().unwrap();
    assert_eq!(config.host, "smtp.gmail.com");
    assert_eq!(config.port, 587);
    assert_eq!(config.from, "no-reply@trentfarmdata.org");

    let content = mail::test_email(Some(&config.username));
    assert!(content.text.contains("sender@gmail.com"));
}
