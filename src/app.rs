use std::sync::{Arc, Mutex};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::domain::error::Result;
use crate::infrastructure::bootstrap::bootstrap;
use crate::infrastructure::config::Settings;
use crate::interfaces::http::{add_log, start_server, LogEntry};

pub fn run() {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    if let Err(err) = serve() {
        error!(error = %err, "casevault stopped");
        std::process::exit(1);
    }
}

fn serve() -> Result<()> {
    let settings = Settings::load()?;
    let logs: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));

    actix_web::rt::System::new().block_on(async move {
        let state = bootstrap(&settings, &logs).await?;

        let server = start_server(
            state,
            logs.clone(),
            &settings.http.host,
            settings.http.port,
        )?;

        add_log(
            &logs,
            "INFO",
            "System",
            &format!(
                "HTTP server started on {}:{}",
                settings.http.host, settings.http.port
            ),
        );
        info!(
            host = %settings.http.host,
            port = settings.http.port,
            "HTTP server started"
        );

        server.await?;
        Ok(())
    })
}
