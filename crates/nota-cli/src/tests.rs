//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use nota_core::config::Config;
use nota_core::test_utils::MockReceiptServer;
use nota_core::{AIClient, NotaService, Outcome, PageFetcher, Session, Storage, StorageMode};
use tempfile::TempDir;

use crate::commands::{self, App};

const SECRET: &str = "enroll";

fn setup_app(dir: &TempDir, mode: StorageMode) -> App {
    let mut config = Config::default();
    config.storage.mode = mode;
    config.storage.data_dir = dir.path().to_path_buf();
    config.enrollment.passphrase = SECRET.to_string();

    let storage = Storage::open(&config.storage, None).unwrap();
    let fetcher = PageFetcher::from_config(&config.fetch).unwrap();
    let service = NotaService::new(storage, SECRET, fetcher, AIClient::mock());
    App::new(config, service, false)
}

fn registered_app(dir: &TempDir) -> App {
    let app = setup_app(dir, StorageMode::Shared);
    assert!(commands::cmd_register(&app, "alice", "pw1", SECRET)
        .unwrap()
        .is_success());
    app
}

// ========== Core Command Tests ==========

#[test]
fn test_db_passphrase() {
    assert_eq!(commands::db_passphrase(true).unwrap(), None);
}

#[test]
fn test_cmd_init() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir, StorageMode::Isolated);
    assert!(commands::cmd_init(&app).is_ok());
    assert!(dir.path().join("nota.db").exists());
}

#[tokio::test]
async fn test_cmd_status() {
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);
    assert!(commands::cmd_status(&app).await.is_ok());
}

// ========== Account Command Tests ==========

#[test]
fn test_cmd_register_logs_in() {
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);

    assert!(app.session_path.exists());
    assert_eq!(app.session().unwrap().username(), Some("alice"));

    let outcome = commands::cmd_whoami(&app).unwrap();
    assert_eq!(outcome.message(), "Logado como alice");
}

#[test]
fn test_cmd_register_conflict_and_bad_secret() {
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);

    let dup = commands::cmd_register(&app, "alice", "pw2", SECRET).unwrap();
    assert!(matches!(
        dup,
        Outcome::Failure {
            label: "ConflictError",
            ..
        }
    ));

    let bad = commands::cmd_register(&app, "bob", "pw", "nope").unwrap();
    assert_eq!(
        bad.message(),
        "Senha comum incorreta. Registro não permitido."
    );
    // Session unchanged
    assert_eq!(app.session().unwrap().username(), Some("alice"));
}

#[test]
fn test_cmd_login_logout() {
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);

    let out = commands::cmd_logout(&app).unwrap();
    assert_eq!(out.message(), "Logout efetuado. Até mais, alice!");
    assert!(!app.session_path.exists());

    let again = commands::cmd_logout(&app).unwrap();
    assert_eq!(again.message(), "Você já está deslogado.");

    let wrong = commands::cmd_login(&app, "alice", "nope").unwrap();
    assert_eq!(wrong.message(), "Login inválido. Verifique usuário e senha.");
    assert_eq!(app.session().unwrap(), Session::Anonymous);

    let ok = commands::cmd_login(&app, "alice", "pw1").unwrap();
    assert_eq!(ok.message(), "Login bem-sucedido! Usuário: alice");
    assert!(app.session().unwrap().is_logged_in());
}

#[test]
fn test_cmd_delete_account() {
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);

    let out = commands::cmd_delete_account(&app, true).unwrap();
    assert_eq!(out.message(), "Conta de alice excluída com sucesso!");
    assert_eq!(app.session().unwrap(), Session::Anonymous);

    let again = commands::cmd_delete_account(&app, true).unwrap();
    assert_eq!(again.message(), "Você não está logado.");
}

// ========== Receipt Command Tests ==========

#[tokio::test]
async fn test_cmd_add_list_show() {
    let server = MockReceiptServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);

    let added = commands::cmd_add(&app, &server.receipt_url("abc"))
        .await
        .unwrap();
    assert_eq!(added.message(), "Nota adicionada com sucesso! (ID: 1)");

    let list = commands::cmd_list(&app).unwrap();
    assert_eq!(
        list.message(),
        "ID: 1, CNPJ: 11.111.111/0001-11, Emissão: 2024-01-01"
    );

    let shown = commands::cmd_show(&app, 1).unwrap();
    assert!(shown.message().contains("Nome: item2"));

    let missing = commands::cmd_show(&app, 2).unwrap();
    assert_eq!(
        missing.message(),
        "Nota não encontrada ou não pertence a você."
    );
}

#[tokio::test]
async fn test_cmd_add_requires_login() {
    let server = MockReceiptServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir, StorageMode::Shared);

    let out = commands::cmd_add(&app, &server.receipt_url("abc"))
        .await
        .unwrap();
    assert!(matches!(
        out,
        Outcome::Failure {
            label: "AuthorizationError",
            ..
        }
    ));
}

#[tokio::test]
async fn test_cmd_add_fetch_error() {
    let server = MockReceiptServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);

    let out = commands::cmd_add(&app, &server.missing_url()).await.unwrap();
    assert!(out.message().starts_with("Erro ao adicionar a nota: "));
    assert_eq!(commands::cmd_list(&app).unwrap().message(), "Nenhuma nota cadastrada.");
}

// ========== Report Command Tests ==========

#[tokio::test]
async fn test_cmd_report() {
    let server = MockReceiptServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);
    commands::cmd_add(&app, &server.receipt_url("1")).await.unwrap();
    commands::cmd_add(&app, &server.receipt_url("2")).await.unwrap();

    let all = commands::cmd_report(&app, None, false).unwrap();
    assert!(all.message().contains("Food: R$ 30.00"));
    assert!(all.message().ends_with("Valor total: R$ 30.00"));

    let one = commands::cmd_report(&app, Some("2"), false).unwrap();
    assert!(one.message().ends_with("Valor total: R$ 15.00"));

    let junk = commands::cmd_report(&app, Some("a,b"), false).unwrap();
    assert!(junk.message().ends_with("Valor total: R$ 30.00"));

    let json = commands::cmd_report(&app, Some("1"), true).unwrap();
    let value: serde_json::Value = serde_json::from_str(json.message()).unwrap();
    assert_eq!(value["grand_total"].as_f64(), Some(15.0));
}

#[tokio::test]
async fn test_cmd_advise() {
    let server = MockReceiptServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = registered_app(&dir);

    let empty = commands::cmd_advise(&app).await.unwrap();
    assert_eq!(
        empty.message(),
        "Nenhum produto encontrado para consultoria."
    );

    commands::cmd_add(&app, &server.receipt_url("1")).await.unwrap();
    let advice = commands::cmd_advise(&app).await.unwrap();
    assert!(advice.is_success());
}

// ========== Prompt Command Tests ==========

#[test]
fn test_cmd_prompts() {
    let mut library = nota_core::PromptLibrary::embedded_only();
    assert!(commands::cmd_prompts_list(&mut library).is_ok());
    assert!(commands::cmd_prompts_show(&mut library, "extract_receipt").is_ok());
    assert!(commands::cmd_prompts_show(&mut library, "unknown").is_ok());
    assert!(commands::cmd_prompts_path().is_ok());
}
