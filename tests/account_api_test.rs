use axum::http::StatusCode;
use filehub_tests::{TestApp, TestResponse, PASSWORD};
use storage::AccountSettings;

async fn login(app: &TestApp, password: &str) -> TestResponse {
    app.post_json(
        "/account/login",
        None,
        serde_json::json!({ "username": "alice", "password": password }),
    )
    .await
}

#[tokio::test]
async fn test_register_login_and_info() {
    let app = TestApp::new().await;

    let token = app.login_new_user("alice").await;
    let info = app.get("/account/info", Some(&token)).await;

    assert_eq!(info.status, StatusCode::OK);
    let info = info.json();
    assert_eq!(info["username"], "alice");
    assert_eq!(info["isAccountConfirmed"], false);
    assert!(info["id"].is_i64());
}

#[tokio::test]
async fn test_login_response_shape() {
    let app = TestApp::new().await;
    app.post_json(
        "/account/register",
        None,
        serde_json::json!({ "username": "alice", "password": PASSWORD }),
    )
    .await;

    let login = app
        .post_json(
            "/account/login",
            None,
            serde_json::json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;

    assert_eq!(login.status, StatusCode::OK);
    let body = login.json();
    assert_eq!(body["tokenType"], "Bearer");
    assert!(body["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["expiresIn"], 30 * 24 * 3600);
}

#[tokio::test]
async fn test_register_rejects_weak_password_and_duplicates() {
    let app = TestApp::new().await;

    let weak = app
        .post_json(
            "/account/register",
            None,
            serde_json::json!({ "username": "alice", "password": "abc" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    let errors = &weak.json()["errors"];
    assert!(errors["PasswordTooShort"].is_array());
    assert!(errors["PasswordRequiresDigit"].is_array());
    assert!(errors["PasswordRequiresUpper"].is_array());
    assert!(errors["PasswordRequiresNonAlphanumeric"].is_array());

    let spaced = app
        .post_json(
            "/account/register",
            None,
            serde_json::json!({ "username": "alice smith", "password": PASSWORD }),
        )
        .await;
    assert_eq!(spaced.status, StatusCode::BAD_REQUEST);
    assert!(spaced.json()["errors"]["InvalidUserName"].is_array());

    app.login_new_user("alice").await;
    let duplicate = app
        .post_json(
            "/account/register",
            None,
            serde_json::json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert!(duplicate.json()["errors"]["DuplicateUserName"].is_array());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.login_new_user("alice").await;

    let login = app
        .post_json(
            "/account/login",
            None,
            serde_json::json!({ "username": "alice", "password": "Wrong99!" }),
        )
        .await;

    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_repeated_wrong_passwords_lock_account() {
    let app = TestApp::new().await;
    app.login_new_user("alice").await;

    for _ in 0..4 {
        assert_eq!(login(&app, "Wrong99!").await.error(), "Invalid username or password");
    }
    let locked = login(&app, "Wrong99!").await;
    assert_eq!(locked.status, StatusCode::UNAUTHORIZED);
    assert_eq!(locked.error(), "Account is locked out. Try again later");

    let correct = login(&app, PASSWORD).await;
    assert_eq!(correct.status, StatusCode::UNAUTHORIZED);
    assert_eq!(correct.error(), "Account is locked out. Try again later");
}

#[tokio::test]
async fn test_unconfirmed_account_cannot_login_when_required() {
    let settings = AccountSettings {
        require_account_confirmation: true,
        ..AccountSettings::default()
    };
    let app = TestApp::with_config(api::Config::default(), settings).await;
    app.post_json(
        "/account/register",
        None,
        serde_json::json!({ "username": "alice", "password": PASSWORD }),
    )
    .await;

    let login = app
        .post_json(
            "/account/login",
            None,
            serde_json::json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        login.error(),
        "Account is not confirmed. Please contact the system administrator"
    );

    assert!(app.accounts.confirm_account("alice").await.unwrap());
    let login = app
        .post_json(
            "/account/login",
            None,
            serde_json::json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = TestApp::new().await;
    let token = app.login_new_user("alice").await;

    let logout = app.post_json("/account/logout", Some(&token), serde_json::json!({})).await;
    assert_eq!(logout.status, StatusCode::OK);

    let info = app.get("/account/info", Some(&token)).await;
    assert_eq!(info.status, StatusCode::UNAUTHORIZED);
    assert_eq!(info.error(), "You are not logged in");
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new().await;
    let token = app.login_new_user("alice").await;

    let missing_old = app
        .post_json(
            "/account/changepassword",
            Some(&token),
            serde_json::json!({ "newPassword": "Newpass2!" }),
        )
        .await;
    assert_eq!(missing_old.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        missing_old.json()["errors"]["OldPasswordRequired"][0],
        "Old password is required to change password"
    );

    let missing_new = app
        .post_json(
            "/account/changepassword",
            Some(&token),
            serde_json::json!({ "oldPassword": PASSWORD }),
        )
        .await;
    assert_eq!(missing_new.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        missing_new.json()["errors"]["NewPasswordRequired"][0],
        "New password is required to change password"
    );

    let changed = app
        .post_json(
            "/account/changepassword",
            Some(&token),
            serde_json::json!({ "oldPassword": PASSWORD, "newPassword": "Newpass2!" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(changed.json()["username"], "alice");

    let old_login = app
        .post_json(
            "/account/login",
            None,
            serde_json::json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(old_login.status, StatusCode::UNAUTHORIZED);

    let new_login = app
        .post_json(
            "/account/login",
            None,
            serde_json::json!({ "username": "alice", "password": "Newpass2!" }),
        )
        .await;
    assert_eq!(new_login.status, StatusCode::OK);
}

#[tokio::test]
async fn test_account_routes_require_login() {
    let app = TestApp::new().await;

    assert_eq!(app.get("/account/info", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.post_json("/account/logout", None, serde_json::json!({})).await.status,
        StatusCode::UNAUTHORIZED
    );
}
