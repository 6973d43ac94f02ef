/// Tag prepended to every container (and volume) name.
pub const CONTAINER_PREFIX: &str = "mysql-";
/// Version sentinel that maps to the engine's own default port.
pub const LATEST: &str = "latest";
pub const DEFAULT_PORT: &str = "3306";
/// Port the engine listens on inside the container.
pub const ENGINE_PORT: u32 = 3306;
pub const DATA_DIR: &str = "/var/lib/mysql";

/// `8.0` becomes `mysql-8-0`. The volume shares this name.
pub fn container_name(version: &str) -> String {
    format!("{}{}", CONTAINER_PREFIX, version.replace('.', "-"))
}

/// Host port published for `version`.
///
/// The dots are dropped, the digits are left-padded to three characters and
/// truncated to the first three, then prefixed with `3`: `8.0` -> `3080`,
/// `5.7` -> `3057`. Longer versions collide silently (`8.0.32` -> `3803`).
pub fn host_port(version: &str) -> String {
    if version == LATEST {
        return DEFAULT_PORT.to_string();
    }
    let digits = version.replace('.', "");
    let padded = format!("{:0>3}", digits);
    let head: String = padded.chars().take(3).collect();
    format!("3{}", head)
}

pub fn image(repository: &str, version: &str) -> String {
    format!("{}:{}", repository, version)
}
