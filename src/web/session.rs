//! Non-secret connection parameters kept in short-lived cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::db::{BackendKind, ConnectionConfig};

pub const CONNECTED: &str = "db_connected";
pub const HOST: &str = "db_host";
pub const PORT: &str = "db_port";
pub const USER: &str = "db_user";
pub const DATABASE: &str = "db_database";
pub const ENCRYPT: &str = "db_encrypt";

const ALL: [&str; 6] = [CONNECTED, HOST, PORT, USER, DATABASE, ENCRYPT];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub encrypt: bool,
}

impl SessionParams {
    pub fn into_config(self, password: String) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host,
            port: self.port,
            user: self.user,
            password,
            database: self.database,
            encrypt: self.encrypt,
        }
    }
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::days(1))
        .build()
}

pub fn is_connected(jar: &CookieJar) -> bool {
    jar.get(CONNECTED).is_some_and(|c| c.value() == "true")
}

/// Connection parameters from the cookies, or `None` when the session is not
/// connected or a required parameter is missing.
pub fn read(jar: &CookieJar, kind: BackendKind) -> Option<SessionParams> {
    if !is_connected(jar) {
        return None;
    }

    let value = |name: &str| jar.get(name).map(|c| c.value().to_string());
    let params = SessionParams {
        host: value(HOST).unwrap_or_default(),
        port: value(PORT)
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| kind.default_port()),
        user: value(USER).unwrap_or_default(),
        database: value(DATABASE)?,
        encrypt: value(ENCRYPT).is_some_and(|e| e == "true"),
    };

    params
        .clone()
        .into_config(String::new())
        .validate(kind)
        .ok()
        .map(|_| params)
}

/// Remembers everything but the password.
pub fn store(jar: CookieJar, config: &ConnectionConfig) -> CookieJar {
    jar.add(session_cookie(HOST, config.host.clone()))
        .add(session_cookie(PORT, config.port.to_string()))
        .add(session_cookie(USER, config.user.clone()))
        .add(session_cookie(DATABASE, config.database.clone()))
        .add(session_cookie(ENCRYPT, config.encrypt.to_string()))
        .add(session_cookie(CONNECTED, "true".to_string()))
}

pub fn clear(jar: CookieJar) -> CookieJar {
    ALL.iter()
        .fold(jar, |jar, name| jar.remove(Cookie::build(*name).path("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    fn jar_from(cookie_header: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie_header).unwrap());
        CookieJar::from_headers(&headers)
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            host: "db.internal".to_string(),
            port: 3307,
            user: "reader".to_string(),
            password: "hunter2".to_string(),
            database: "shop".to_string(),
            encrypt: true,
        }
    }

    #[test]
    fn stored_session_never_contains_the_password() {
        let jar = store(CookieJar::new(), &config());
        assert!(jar.iter().all(|c| c.value() != "hunter2"));
        assert_eq!(jar.get(CONNECTED).map(|c| c.value()), Some("true"));
        assert_eq!(jar.get(PORT).map(|c| c.value()), Some("3307"));
        assert_eq!(jar.get(HOST).and_then(|c| c.http_only()), Some(true));
    }

    #[test]
    fn read_round_trips_the_stored_parameters() {
        let jar = jar_from(
            "db_connected=true; db_host=db.internal; db_port=3307; db_user=reader; \
             db_database=shop; db_encrypt=true",
        );
        let params = read(&jar, BackendKind::MySql).unwrap();
        assert_eq!(
            params.into_config("pw".to_string()),
            ConnectionConfig {
                password: "pw".to_string(),
                ..config()
            }
        );
    }

    #[test]
    fn read_requires_the_connected_flag_and_a_database() {
        let not_flagged = jar_from("db_host=h; db_database=shop");
        let no_database = jar_from("db_connected=true; db_host=h; db_user=u");
        let flag_off = jar_from("db_connected=false; db_database=shop");

        assert_eq!(read(&not_flagged, BackendKind::MySql), None);
        assert_eq!(read(&no_database, BackendKind::MySql), None);
        assert_eq!(read(&flag_off, BackendKind::DuckDb), None);
    }

    #[test]
    fn missing_port_falls_back_to_the_backend_default() {
        let jar = jar_from("db_connected=true; db_host=h; db_user=u; db_database=shop");
        assert_eq!(read(&jar, BackendKind::MySql).map(|p| p.port), Some(3306));
    }

    #[test]
    fn clear_removes_every_connection_cookie() {
        let jar = clear(jar_from("db_connected=true; db_database=shop; db_encrypt=false"));
        for name in ALL {
            assert!(jar.get(name).is_none(), "{} still present", name);
        }
    }
}
