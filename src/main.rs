use anyhow::Context;
use clap::Parser;
use course_registry::utils::logger;
use course_registry::{
    App, AppConfig, Caller, CliConfig, Command, DeskResponse, Entity, NewCourse, NewStudent,
    RegistryError,
};
use serde::Serialize;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // Logging is not up yet, so config problems go straight to stderr.
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    logger::init_logger(config.logging.format, config.logging.verbose);
    tracing::info!("Starting course-registry CLI");
    tracing::debug!("CLI config: {:?}", cli);

    let app = App::build(&config)
        .await
        .with_context(|| format!("failed to open registry at {}", config.database.path))?;

    let response = run(&app, &config, cli.command).await;
    app.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&response.body)?);

    if !response.is_success() {
        tracing::error!(
            status = response.status,
            "❌ {}",
            response.message_text().unwrap_or("request failed")
        );
        // 4xx: the request was refused; 5xx: the registry itself failed.
        let exit_code = if response.status >= 500 { 3 } else { 2 };
        std::process::exit(exit_code);
    }

    tracing::info!("✅ Done");
    Ok(())
}

async fn run(app: &App, config: &AppConfig, command: Command) -> DeskResponse {
    match command {
        Command::Init => DeskResponse {
            status: 200,
            body: json!({ "message": format!("Registry initialized at {}", config.database.path) }),
        },
        Command::AddStudent {
            name,
            email,
            credential_hash,
            phone,
        } => {
            let input = NewStudent {
                name,
                email,
                credential_hash,
                phone_number: phone,
            };
            respond(app.catalog.create_student(input).await, 201)
        }
        Command::AddCourse {
            name,
            code,
            description,
            max_students,
            professor_id,
        } => {
            let input = NewCourse {
                name,
                code,
                description,
                max_students,
                professor_id,
            };
            respond(app.catalog.create_course(input).await, 201)
        }
        Command::Enroll {
            caller,
            student,
            course,
        } => app.desk.enroll(Caller(caller), student, course).await,
        Command::Unregister {
            caller,
            student,
            course,
        } => app.desk.unregister(Caller(caller), student, course).await,
        Command::Courses { caller } => app.desk.my_courses(Caller(caller)).await,
        Command::Roster { course } => respond(app.catalog.course_roster(course).await, 200),
        Command::DeleteStudent { id } => {
            deleted(app.catalog.delete_student(id).await, Entity::Student)
        }
        Command::DeleteCourse { id } => deleted(app.catalog.delete_course(id).await, Entity::Course),
    }
}

fn respond<T: Serialize>(result: course_registry::Result<T>, status: u16) -> DeskResponse {
    let value = result.and_then(|value| serde_json::to_value(value).map_err(RegistryError::from));
    match value {
        Ok(body) => DeskResponse { status, body },
        Err(e) => DeskResponse {
            status: e.http_status(),
            body: json!({ "message": e.user_friendly_message() }),
        },
    }
}

fn deleted(result: course_registry::Result<bool>, entity: Entity) -> DeskResponse {
    match result {
        Ok(true) => DeskResponse {
            status: 200,
            body: json!({ "message": format!("{} deleted successfully!", entity) }),
        },
        Ok(false) => respond::<()>(Err(RegistryError::NotFound(entity)), 404),
        Err(e) => respond::<()>(Err(e), 500),
    }
}
