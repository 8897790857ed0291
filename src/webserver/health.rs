/// Liveness check on the private listener; a reachable process is a healthy
/// one.
pub async fn health() {}
