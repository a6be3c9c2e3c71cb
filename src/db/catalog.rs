use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Supported database engines. Serialized form doubles as the catalog id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Postgres,
    Redis,
    Mysql,
    Mongo,
}

impl DatabaseType {
    pub const ALL: [DatabaseType; 4] = [
        DatabaseType::Postgres,
        DatabaseType::Redis,
        DatabaseType::Mysql,
        DatabaseType::Mongo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Redis => "redis",
            Self::Mysql => "mysql",
            Self::Mongo => "mongo",
        }
    }

    /// Default host port, matching the engine's well-known port
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Redis => 6379,
            Self::Mysql => 3306,
            Self::Mongo => 27017,
        }
    }

    /// Data directory inside the container, used for volume binds
    pub fn data_dir(&self) -> &'static str {
        match self {
            Self::Postgres => "/var/lib/postgresql/data",
            Self::Redis => "/data",
            Self::Mysql => "/var/lib/mysql",
            Self::Mongo => "/data/db",
        }
    }

    /// Environment variables for container initialization
    pub fn env_vars(&self, password: &str) -> Vec<(String, String)> {
        match self {
            Self::Postgres => vec![("POSTGRES_PASSWORD".to_string(), password.to_string())],
            Self::Mysql => vec![("MYSQL_ROOT_PASSWORD".to_string(), password.to_string())],
            Self::Mongo => vec![
                ("MONGO_INITDB_ROOT_USERNAME".to_string(), "root".to_string()),
                ("MONGO_INITDB_ROOT_PASSWORD".to_string(), password.to_string()),
            ],
            Self::Redis => vec![],
        }
    }

    /// Container command override. Redis takes its password via CMD, not ENV.
    pub fn command(&self, password: &str) -> Option<Vec<String>> {
        match self {
            Self::Redis => Some(vec![
                "redis-server".to_string(),
                "--requirepass".to_string(),
                password.to_string(),
            ]),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "mysql" => Ok(Self::Mysql),
            "mongo" => Ok(Self::Mongo),
            _ => Err(AppError::ImageUnsupported(s.to_string())),
        }
    }
}

/// Catalog entry describing an installable database image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedImage {
    pub id: DatabaseType,
    pub name: Cow<'static, str>,
    #[serde(rename = "hubName")]
    pub hub_name: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub default_port: u16,
}

pub static SUPPORTED_IMAGES: [SupportedImage; 4] = [
    SupportedImage {
        id: DatabaseType::Postgres,
        name: Cow::Borrowed("PostgreSQL"),
        hub_name: Cow::Borrowed("library/postgres"),
        description: Cow::Borrowed("Advanced open source database"),
        default_port: 5432,
    },
    SupportedImage {
        id: DatabaseType::Redis,
        name: Cow::Borrowed("Redis"),
        hub_name: Cow::Borrowed("library/redis"),
        description: Cow::Borrowed("In-memory data structure store"),
        default_port: 6379,
    },
    SupportedImage {
        id: DatabaseType::Mysql,
        name: Cow::Borrowed("MySQL"),
        hub_name: Cow::Borrowed("library/mysql"),
        description: Cow::Borrowed("Popular relational database"),
        default_port: 3306,
    },
    SupportedImage {
        id: DatabaseType::Mongo,
        name: Cow::Borrowed("MongoDB"),
        hub_name: Cow::Borrowed("library/mongo"),
        description: Cow::Borrowed("NoSQL document database"),
        default_port: 27017,
    },
];

/// Look up a catalog entry by its id
pub fn get_supported_image(id: &str) -> crate::error::Result<&'static SupportedImage> {
    let database_type = DatabaseType::from_str(id)?;
    SUPPORTED_IMAGES
        .iter()
        .find(|img| img.id == database_type)
        .ok_or_else(|| AppError::ImageUnsupported(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_exactly_four_entries() {
        assert_eq!(SUPPORTED_IMAGES.len(), 4);
        let ids: Vec<&str> = SUPPORTED_IMAGES.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["postgres", "redis", "mysql", "mongo"]);
    }

    #[test]
    fn default_ports_match_well_known_ports() {
        for img in &SUPPORTED_IMAGES {
            assert_eq!(img.default_port, img.id.default_port());
        }
        assert_eq!(get_supported_image("postgres").unwrap().default_port, 5432);
        assert_eq!(get_supported_image("redis").unwrap().default_port, 6379);
        assert_eq!(get_supported_image("mysql").unwrap().default_port, 3306);
        assert_eq!(get_supported_image("mongo").unwrap().default_port, 27017);
    }

    #[test]
    fn redis_lookup_yields_full_record() {
        let img = get_supported_image("redis").unwrap();
        assert_eq!(img.id, DatabaseType::Redis);
        assert_eq!(img.name, "Redis");
        assert_eq!(img.hub_name, "library/redis");
        assert_eq!(img.description, "In-memory data structure store");
        assert_eq!(img.default_port, 6379);
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!(get_supported_image("sqlite").is_err());
        assert!("cockroach".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn database_type_serializes_to_catalog_id() {
        for ty in DatabaseType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
            let back: DatabaseType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn supported_image_serializes_hub_name_in_camel_case() {
        let json = serde_json::to_value(&SUPPORTED_IMAGES[1]).unwrap();
        assert_eq!(json["id"], "redis");
        assert_eq!(json["hubName"], "library/redis");
        assert_eq!(json["default_port"], 6379);
    }

    #[test]
    fn supported_image_round_trips_through_serde() {
        for img in &SUPPORTED_IMAGES {
            let json = serde_json::to_string(img).unwrap();
            let back: SupportedImage = serde_json::from_str(&json).unwrap();
            assert_eq!(&back, img);
        }
    }

    #[test]
    fn redis_password_goes_through_command_not_env() {
        assert!(DatabaseType::Redis.env_vars("secret").is_empty());
        let cmd = DatabaseType::Redis.command("secret").unwrap();
        assert_eq!(cmd, vec!["redis-server", "--requirepass", "secret"]);
        assert!(DatabaseType::Postgres.command("secret").is_none());
    }
}
