use std::sync::Arc;

use detective_service::DetectiveService;
use detective_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<DetectiveService>,
}
impl AppState {
	pub async fn new(config: detective_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		Ok(Self::from_service(DetectiveService::new(config, db)))
	}

	pub fn from_service(service: DetectiveService) -> Self {
		Self { service: Arc::new(service) }
	}
}
