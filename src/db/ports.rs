use crate::error::{AppError, Result};

use super::catalog::DatabaseType;

/// First free port at or above `preferred`, given the currently published
/// host ports.
pub fn next_free_port(preferred: u16, occupied: &[u16]) -> Result<u16> {
    for port in preferred..=u16::MAX {
        if !occupied.contains(&port) {
            return Ok(port);
        }
    }
    Err(AppError::NoFreePort)
}

/// Pick the host port for a new instance: the requested port if given,
/// otherwise the first free port starting at the engine's default.
pub fn allocate_port(
    database_type: DatabaseType,
    requested: Option<u16>,
    occupied: &[u16],
) -> Result<u16> {
    let preferred = requested.unwrap_or_else(|| database_type.default_port());
    next_free_port(preferred, occupied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_preferred_port_is_returned_unchanged() {
        assert_eq!(next_free_port(5432, &[]).unwrap(), 5432);
        assert_eq!(next_free_port(5432, &[6379]).unwrap(), 5432);
    }

    #[test]
    fn occupied_ports_are_skipped() {
        assert_eq!(next_free_port(5432, &[5432]).unwrap(), 5433);
        assert_eq!(next_free_port(5432, &[5432, 5433, 5434]).unwrap(), 5435);
    }

    #[test]
    fn exhausted_range_is_an_error() {
        let occupied: Vec<u16> = (65530..=u16::MAX).collect();
        assert!(matches!(
            next_free_port(65530, &occupied),
            Err(AppError::NoFreePort)
        ));
    }

    #[test]
    fn allocation_starts_at_engine_default() {
        assert_eq!(allocate_port(DatabaseType::Redis, None, &[]).unwrap(), 6379);
        assert_eq!(
            allocate_port(DatabaseType::Redis, None, &[6379]).unwrap(),
            6380
        );
        assert_eq!(
            allocate_port(DatabaseType::Mongo, Some(28000), &[]).unwrap(),
            28000
        );
    }
}
