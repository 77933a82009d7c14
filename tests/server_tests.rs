//! HTTP tests against a live server on a loopback port.

use housing_dashboard::config::DashboardConfig;
use housing_dashboard::loader::DataSource;
use housing_dashboard::presentation::{router, AppState};
use housing_dashboard::trainer::TrainerOptions;
use std::io::Write;
use std::time::Duration;

const FIXTURE: &str = "CRIM,INDUS,CHAS,NOX,RM,PTRATIO,LSTAT,MEDV\n\
                       0.1,2.0,0,0.40,6.5,15.0,5.0,30.0\n\
                       0.2,3.0,1,0.45,6.8,15.5,6.0,32.0\n\
                       0.3,4.0,0,0.50,5.9,17.0,9.0,22.0\n\
                       1.5,8.0,0,0.60,5.5,19.0,15.0,15.0\n\
                       2.5,10.0,1,0.65,5.2,20.0,18.0,12.0\n\
                       0.05,1.5,0,0.38,7.2,14.0,3.0,45.0\n";

struct Responses {
    health: String,
    page_status: u16,
    page: String,
    predicted_page: String,
    refreshed_status: u16,
    api: serde_json::Value,
    rejected_status: u16,
    rejected: serde_json::Value,
}

fn exercise(base: &str) -> Responses {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(60))
        .build();

    let health = agent
        .get(&format!("{base}/health"))
        .call()
        .expect("health responds")
        .into_string()
        .expect("health body");

    let page = agent
        .get(&format!("{base}/?lo=15&hi=40&cols=RM&cols=MEDV"))
        .call()
        .expect("page responds");
    let page_status = page.status();
    let cookie = page
        .header("set-cookie")
        .and_then(|c| c.split(';').next())
        .expect("session cookie")
        .to_string();
    let page = page.into_string().expect("page body");

    let predicted_page = agent
        .post(&format!("{base}/predict"))
        .set("Cookie", &cookie)
        .send_form(&[
            ("f_CRIM", "0.5"),
            ("f_INDUS", "5"),
            ("f_CHAS", "Não"),
            ("f_NOX", "0.5"),
            ("f_RM", "6.2"),
            ("f_PTRATIO", "17"),
        ])
        .expect("predict responds")
        .into_string()
        .expect("predict body");

    let refreshed_status = agent
        .post(&format!("{base}/refresh"))
        .set("Cookie", &cookie)
        .call()
        .expect("refresh follows redirect")
        .status();

    let api = agent
        .post(&format!("{base}/api/predict"))
        .set("Cookie", &cookie)
        .set("Content-Type", "application/json")
        .send_string(
            r#"{"features":{"CRIM":0.5,"INDUS":5,"CHAS":1,"NOX":0.5,"RM":6.2,"PTRATIO":17}}"#,
        )
        .expect("api responds")
        .into_string()
        .expect("api body");

    let (rejected_status, rejected) = match agent
        .post(&format!("{base}/api/predict"))
        .set("Content-Type", "application/json")
        .send_string(r#"{"features":{"RM":6.2}}"#)
    {
        Err(ureq::Error::Status(code, response)) => {
            (code, response.into_string().expect("error body"))
        }
        other => panic!("expected an error status, got {other:?}"),
    };

    Responses {
        health,
        page_status,
        page,
        predicted_page,
        refreshed_status,
        api: serde_json::from_str(&api).expect("api JSON"),
        rejected_status,
        rejected: serde_json::from_str(&rejected).expect("error JSON"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_server_round_trip() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(FIXTURE.as_bytes()).expect("write fixture");

    let state = AppState::new(DashboardConfig {
        source: DataSource::File(file.path().to_path_buf()),
        trainer: TrainerOptions {
            n_estimators: 5,
            random_state: Some(3),
            ..TrainerOptions::default()
        },
        ..DashboardConfig::default()
    })
    .expect("state builds");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move { axum::serve(listener, router(state)).await });

    let base = format!("http://{addr}");
    let responses = tokio::task::spawn_blocking(move || exercise(&base))
        .await
        .expect("client task");
    server.abort();

    assert!(responses.health.contains("healthy"));

    assert_eq!(responses.page_status, 200);
    assert!(responses.page.contains("Data App - Prevendo Valores de Imoveis"));
    assert!(responses.page.contains(r#"name="lo" value="15.0""#));
    assert!(responses.page.contains(r#"name="hi" value="40.0""#));

    assert!(responses.predicted_page.contains("O valor previsto para o imóvel é:"));
    assert_eq!(responses.refreshed_status, 200);

    let prediction = responses.api["prediction"].as_f64().expect("number") as f32;
    let rounded = (f64::from(prediction) * 1000.0).round_ties_even() / 100.0;
    let display = responses.api["display"].as_str().expect("display string");
    let shown: f64 = display
        .strip_prefix("US $ ")
        .expect("currency prefix")
        .parse()
        .expect("numeric display");
    assert_eq!(shown, rounded);
    assert!(display.contains('.'));

    assert_eq!(responses.rejected_status, 422);
    assert_eq!(responses.rejected["kind"], "prediction_input_mismatch");
}
