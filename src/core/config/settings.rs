use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_u16,
    parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, QuizSettings,
    RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("BRIGHTCLASS_HOST", "0.0.0.0");
        let port = env_or_default("BRIGHTCLASS_PORT", "8000");

        let environment = parse_environment(
            env_optional("BRIGHTCLASS_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("BRIGHTCLASS_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Brightclass API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "brightclass");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "brightclass_db");
        let database_url = env_optional("DATABASE_URL");

        let max_questions_per_quiz = parse_u64(
            "MAX_QUESTIONS_PER_QUIZ",
            env_or_default("MAX_QUESTIONS_PER_QUIZ", "200"),
        )?;
        let max_options_per_question = parse_u64(
            "MAX_OPTIONS_PER_QUESTION",
            env_or_default("MAX_OPTIONS_PER_QUESTION", "12"),
        )?;

        let bootstrap_admin_email =
            env_or_default("BOOTSTRAP_ADMIN_EMAIL", "admin@brightclass.local");
        let bootstrap_admin_name = env_or_default("BOOTSTRAP_ADMIN_NAME", "Platform Admin");

        let log_level = env_or_default("BRIGHTCLASS_LOG_LEVEL", "info");
        let json = env_optional("BRIGHTCLASS_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            quiz: QuizSettings { max_questions_per_quiz, max_options_per_question },
            admin: AdminSettings { bootstrap_admin_email, bootstrap_admin_name },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.quiz.max_questions_per_quiz == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_QUESTIONS_PER_QUIZ",
                value: "0".to_string(),
            });
        }

        if self.quiz.max_options_per_question < 2 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_OPTIONS_PER_QUESTION",
                value: self.quiz.max_options_per_question.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.bootstrap_admin_email.is_empty() {
            return Err(ConfigError::MissingSecret("BOOTSTRAP_ADMIN_EMAIL"));
        }

        Ok(())
    }
}
