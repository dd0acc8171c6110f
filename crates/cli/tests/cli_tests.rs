// End-to-end tests of the pchoque binary: offline snapshots and a mock backend.
//
// Run with: cargo test -p plan-choque-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use calamine::{open_workbook, Reader, Xlsx};
use httpmock::prelude::*;
use serde_json::{json, Value};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/snapshot.json");

/// Isolated home directory with an optional settings file.
struct Env {
    dir: tempfile::TempDir,
}

impl Env {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    fn with_settings(settings: Value) -> Self {
        let env = Self::new();
        std::fs::write(env.settings_path(), settings.to_string()).unwrap();
        env
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.path().join("settings.json")
    }

    fn out_dir(&self) -> PathBuf {
        let out = self.dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        out
    }

    fn pchoque(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pchoque"));
        cmd.env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env_remove("PCHOQUE_TOKEN")
            .env_remove("PCHOQUE_API_BASE")
            .env_remove("RUST_LOG");
        if self.settings_path().exists() {
            cmd.arg("--config").arg(self.settings_path());
        }
        cmd.args(args).output().expect("run pchoque")
    }
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json_stdout(output: &Output) -> Value {
    serde_json::from_str(stdout(output).trim())
        .unwrap_or_else(|e| panic!("stdout must be JSON: {e}\n{}", stdout(output)))
}

fn card<'a>(summary: &'a Value, kind: &str) -> &'a Value {
    summary["cards"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["kind"] == kind)
        .unwrap_or_else(|| panic!("no {kind} card in {summary}"))
}

// ===========================================================================
// Offline snapshot
// ===========================================================================

#[test]
fn summary_json_aggregates_each_category() {
    let env = Env::new();
    let output = env.pchoque(&["summary", "--input", FIXTURE, "-f", "json"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let summary = json_stdout(&output);
    assert_eq!(summary["scope"], "ot");
    assert_eq!(summary["cards"].as_array().unwrap().len(), 4);

    let volume = card(&summary, "volumen");
    assert_eq!((volume["meta"].as_f64(), volume["real"].as_f64()), (Some(150.0), Some(130.0)));
    assert_eq!(volume["porcentaje"], 87);

    let coverage = card(&summary, "cobertura");
    assert_eq!((coverage["meta"].as_f64(), coverage["real"].as_f64()), (Some(3.0), Some(2.0)));
    assert_eq!(coverage["porcentaje"], 67);

    let visits = card(&summary, "visitas");
    assert_eq!(visits["pdvs_impactados"], 3);
    assert_eq!(visits["registros"], 4);
    assert_eq!(visits["porcentaje"], 10);
}

#[test]
fn summary_text_lists_cards() {
    let env = Env::new();
    let output = env.pchoque(&["summary", "--input", FIXTURE]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("KPI"));
    assert!(text.contains("Volumen"));
    assert!(text.contains("87%"));
    assert_eq!(text.lines().count(), 5);
}

#[test]
fn filters_rederive_the_cards() {
    let env = Env::new();
    let output = env.pchoque(&["summary", "--input", FIXTURE, "--compania", "Terpel", "-f", "json"]);
    assert_eq!(code(&output), 0);
    let summary = json_stdout(&output);
    assert_eq!(card(&summary, "cobertura")["porcentaje"], 50);
    assert_eq!(card(&summary, "visitas")["pdvs_impactados"], 2);
    assert_eq!(card(&summary, "visitas")["porcentaje"], 7);
}

#[test]
fn ot_agente_filter_narrows_the_cards() {
    let env = Env::new();
    let output = env.pchoque(&["summary", "--input", FIXTURE, "--scope", "ot", "--agente", "12", "-f", "json"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    let summary = json_stdout(&output);
    assert_eq!(card(&summary, "cobertura")["registros"], 2);
    assert_eq!(card(&summary, "cobertura")["porcentaje"], 100);
    assert_eq!(card(&summary, "volumen")["porcentaje"], 80);
    assert_eq!(card(&summary, "visitas")["registros"], 3);
    assert_eq!(card(&summary, "visitas")["pdvs_impactados"], 2);
}

#[test]
fn date_range_without_volume_gives_zero_not_nan() {
    let env = Env::new();
    let output = env.pchoque(&["summary", "--input", FIXTURE, "--desde", "2025-04-01", "-f", "json"]);
    assert_eq!(code(&output), 0);
    let summary = json_stdout(&output);
    assert_eq!(card(&summary, "volumen")["porcentaje"], 0);
    assert_eq!(card(&summary, "cobertura")["porcentaje"], 100);
}

#[test]
fn metric_selector_shows_one_card() {
    let env = Env::new();
    let output = env.pchoque(&["summary", "--input", FIXTURE, "--metrica", "precios", "-f", "json"]);
    let summary = json_stdout(&output);
    let cards = summary["cards"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["kind"], "precios");
}

#[test]
fn detail_by_segment_as_csv() {
    let env = Env::new();
    let output = env.pchoque(&["detail", "volumen", "--by", "segmento", "--input", FIXTURE, "-f", "csv"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "Segmento,Cantidad PDVs,Total Galones,Promedio\nRural,1,50,50\nUrbano,1,80,80\n"
    );
}

#[test]
fn detail_compliance_band_keeps_pending_rows() {
    let env = Env::new();
    let output = env.pchoque(&["detail", "cobertura", "--input", FIXTURE, "--rango", "0-49", "-f", "json"]);
    assert_eq!(code(&output), 0);
    let rows = json_stdout(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["codigo"], "PDV-B");
    assert_eq!(rows[0]["porcentaje"], 0);
}

#[test]
fn detail_price_checks() {
    let env = Env::new();
    let output = env.pchoque(&["detail", "precios", "--by", "precios", "--input", FIXTURE, "-f", "json"]);
    let rows = json_stdout(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["cumple"], true);
    assert_eq!(rows[1]["cumple"], false);
}

#[test]
fn bad_arguments_are_usage_errors() {
    let env = Env::new();
    assert_eq!(code(&env.pchoque(&["summary", "--input", FIXTURE, "--desde", "03/01/2025"])), 2);
    assert_eq!(code(&env.pchoque(&["summary", "--input", "missing.json"])), 2);
    assert_eq!(
        code(&env.pchoque(&["summary", "--input", FIXTURE, "--desde", "2025-04-01", "--hasta", "2025-03-01"])),
        2
    );
}

#[test]
fn kpi_table_override_changes_visit_semantics() {
    let env = Env::new();
    let table = env.dir.path().join("kpi.toml");
    std::fs::write(&table, "[visitas]\naggregation = { strategy = \"count_of_success\", token = \"X\" }\n").unwrap();
    let output = env.pchoque(&["summary", "--input", FIXTURE, "--kpi-table", table.to_str().unwrap(), "-f", "json"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    let visits = card(&json_stdout(&output), "visitas").clone();
    assert_eq!(visits["meta"].as_f64(), Some(4.0));
    assert_eq!(visits["porcentaje"], 0);

    std::fs::write(&table, "[precios]\naggregation = { strategy = \"sum_of_fields\" }\n").unwrap();
    let output = env.pchoque(&["summary", "--input", FIXTURE, "--kpi-table", table.to_str().unwrap()]);
    assert_eq!(code(&output), 2);
}

// ===========================================================================
// Report
// ===========================================================================

fn xlsx_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "xlsx"))
        .collect()
}

#[test]
fn ot_report_is_denied_without_privilege() {
    let env = Env::new();
    let out = env.out_dir();
    let output = env.pchoque(&["report", "--input", FIXTURE, "--out", out.to_str().unwrap()]);
    assert_eq!(code(&output), 51);
    assert!(stderr(&output).contains("hint:"));
    assert!(xlsx_files(&out).is_empty());

    let output = env.pchoque(&["report", "--input", FIXTURE, "--email", "ana@terpel.com", "--out", out.to_str().unwrap()]);
    assert_eq!(code(&output), 51);
}

#[test]
fn ot_report_with_domain_writes_workbook() {
    let env = Env::with_settings(json!({ "access.privilegedDomain": "terpel.com" }));
    let out = env.out_dir();
    let output = env.pchoque(&["report", "--input", FIXTURE, "--email", "ana@terpel.com", "--out", out.to_str().unwrap()]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let files = xlsx_files(&out);
    assert_eq!(files.len(), 1);
    assert_eq!(PathBuf::from(stdout(&output).trim()), files[0]);
    let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("Reporte_Plan_Choque_OT_"), "{name}");

    let workbook: Xlsx<_> = open_workbook(&files[0]).unwrap();
    let sheets = workbook.sheet_names();
    assert_eq!(sheets[0], "Resumen Ejecutivo");
    assert!(sheets.iter().any(|s| s == "Volumen"));
    assert!(sheets.iter().any(|s| s == "Cobertura"));
}

#[test]
fn mercadeo_report_is_not_gated() {
    let env = Env::with_settings(json!({ "report.label": "Informe", "report.detailSheets": false }));
    let out = env.out_dir();
    let output = env.pchoque(&[
        "report", "--input", FIXTURE, "--scope", "mercadeo", "--agente", "12", "--out", out.to_str().unwrap(),
    ]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    let files = xlsx_files(&out);
    assert_eq!(files.len(), 1);
    assert!(files[0].file_name().unwrap().to_string_lossy().starts_with("Informe_Mercadeo_"));
}

#[test]
fn report_into_missing_directory_fails_cleanly() {
    let env = Env::new();
    let missing = env.dir.path().join("nope");
    let output = env.pchoque(&[
        "report", "--input", FIXTURE, "--scope", "mercadeo", "--agente", "1", "--out", missing.to_str().unwrap(),
    ]);
    assert_eq!(code(&output), 50);
    assert!(!missing.exists());
}

// ===========================================================================
// Live backend
// ===========================================================================

fn me(server: &MockServer, status: u16, body: Value) {
    server.mock(|when, then| {
        when.method(GET).path("/api/auth/me");
        then.status(status).json_body(body);
    });
}

fn ot_user() -> Value {
    json!({ "success": true, "user": { "id": 1, "name": "Laura", "email": "laura@terpel.com", "rol": "ot", "reporte_privilegiado": true } })
}

fn live_env(server: &MockServer) -> Env {
    Env::with_settings(json!({ "api.base": server.base_url(), "api.timeoutSecs": 5 }))
}

#[test]
fn missing_token_is_session_expired() {
    let server = MockServer::start();
    let env = live_env(&server);
    let output = env.pchoque(&["summary"]);
    assert_eq!(code(&output), 40);
    assert!(stderr(&output).contains("sesión ha expirado"));
}

#[test]
fn unauthorized_and_server_error_differ() {
    let server = MockServer::start();
    me(&server, 401, json!({ "success": false }));
    let env = live_env(&server);
    let expired = env.pchoque(&["summary", "--token", "old"]);
    assert_eq!(code(&expired), 40);

    let server = MockServer::start();
    me(&server, 500, json!({ "error": "boom" }));
    let env = live_env(&server);
    let failed = env.pchoque(&["summary", "--token", "tok"]);
    assert_eq!(code(&failed), 42);
    assert_ne!(stderr(&expired), stderr(&failed));
}

#[test]
fn live_summary_survives_one_failed_dataset() {
    let server = MockServer::start();
    me(&server, 200, ot_user());
    for (path, body) in [
        ("/api/ot/asesores", json!({ "success": true, "data": [] })),
        ("/api/ot/puntos-venta", json!({ "success": true, "data": [] })),
        ("/api/ot/kpi/cobertura", json!({ "success": true, "data": [{ "id": 1, "codigo": "A", "estado": "REGISTRADO" }] })),
        ("/api/ot/kpi/volumen", json!({ "success": true, "data": [{ "id": 1, "codigo": "A", "meta": 100, "real": 80 }] })),
        ("/api/ot/kpi/precios", json!({ "success": true, "pdvs": [] })),
    ] {
        server.mock(|when, then| {
            when.method(GET).path(path).header("authorization", "Bearer tok");
            then.status(200).json_body(body);
        });
    }
    server.mock(|when, then| {
        when.method(GET).path("/api/ot/kpi/visitas");
        then.status(500).body("db down");
    });

    let env = live_env(&server);
    let output = env.pchoque(&["summary", "--token", "tok", "-f", "json"]);
    assert_eq!(code(&output), 44, "stderr: {}", stderr(&output));

    let summary = json_stdout(&output);
    assert_eq!(summary["cards"].as_array().unwrap().len(), 3);
    assert_eq!(card(&summary, "volumen")["porcentaje"], 80);
    assert_eq!(summary["errores"][0]["dataset"], "visitas");
    assert!(stderr(&output).contains("warning: visitas"));
}

#[test]
fn live_dates_are_sent_to_the_backend() {
    let server = MockServer::start();
    me(&server, 200, ot_user());
    let kpi = server.mock(|when, then| {
        when.method(GET)
            .path("/api/ot/kpi/volumen")
            .query_param("fecha_desde", "2025-03-01")
            .query_param("fecha_hasta", "2025-03-31");
        then.status(200).json_body(json!({ "success": true, "data": [] }));
    });
    for path in ["/api/ot/asesores", "/api/ot/puntos-venta", "/api/ot/kpi/cobertura", "/api/ot/kpi/visitas", "/api/ot/kpi/precios"] {
        server.mock(|when, then| {
            when.method(GET).path(path);
            then.status(200).json_body(json!({ "success": true, "data": [] }));
        });
    }

    let env = live_env(&server);
    let output = env.pchoque(&["summary", "--token", "tok", "--desde", "2025-03-01", "--hasta", "2025-03-31"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    kpi.assert();
}

#[test]
fn asesor_role_has_no_dashboard() {
    let server = MockServer::start();
    me(&server, 200, json!({ "success": true, "user": { "id": 9, "email": "a@terpel.com", "rol": "asesor" } }));
    let env = live_env(&server);
    let output = env.pchoque(&["summary", "--token", "tok"]);
    assert_eq!(code(&output), 41);
}

// ===========================================================================
// Implementation form
// ===========================================================================

#[test]
fn implementacion_dry_run_prints_payload() {
    let env = Env::new();
    let output = env.pchoque(&[
        "implementacion",
        "--pdv",
        "17",
        "--producto",
        "referencia=20W50,cajas=4,galones=50",
        "--producto",
        "ref=15W40,galones=30,comentario=Buena rotación",
        "--dry-run",
    ]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let payload = json_stdout(&output);
    assert_eq!(payload["pdv_id"], "17");
    let productos = payload["productos"].as_array().unwrap();
    assert_eq!(productos.len(), 2);
    assert_eq!(productos[0]["id"], "tmp-1");
    assert_eq!(productos[1]["tieneComentarios"], true);
}

#[test]
fn implementacion_rejects_bad_products() {
    let env = Env::new();
    let output = env.pchoque(&["implementacion", "--pdv", "17", "--producto", "cajas=2", "--dry-run"]);
    assert_eq!(code(&output), 2);

    let output = env.pchoque(&["implementacion", "--pdv", "17", "--producto", "color=rojo", "--dry-run"]);
    assert_eq!(code(&output), 2);
}

#[test]
fn implementacion_posts_to_backend() {
    let server = MockServer::start();
    let submit = server.mock(|when, then| {
        when.method(POST)
            .path("/api/asesor/implementaciones")
            .header("authorization", "Bearer tok")
            .body_includes(r#""pdv_id":"17""#);
        then.status(200).json_body(json!({ "success": true }));
    });

    let env = live_env(&server);
    let output = env.pchoque(&[
        "implementacion",
        "--token",
        "tok",
        "--pdv",
        "17",
        "--producto",
        "referencia=20W50,cajas=4,galones=50",
    ]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    submit.assert();
    assert!(stderr(&output).contains("Implementación registrada"));
}

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn config_init_writes_template_once() {
    let env = Env::new();
    let path = env.dir.path().join("cfg/settings.json");
    let path_arg = path.to_str().unwrap();

    let output = env.pchoque(&["--config", path_arg, "config", "init"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert!(std::fs::read_to_string(&path).unwrap().contains("api.base"));

    let output = env.pchoque(&["--config", path_arg, "config", "init"]);
    assert_eq!(code(&output), 0);
    assert!(stderr(&output).contains("left unchanged"));

    let output = env.pchoque(&["--config", path_arg, "config", "show"]);
    assert_eq!(json_stdout(&output)["report.maxColumnWidth"], 50);
}
