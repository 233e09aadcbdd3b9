pub mod cron;
pub mod server;

use futures::future;

use crate::{prelude::*, state::AppState};

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Box<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new() }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Box::new(plugin));
    self
  }

  /// Start every plugin on its own task and wait until all have stopped.
  pub async fn run(self, app: Arc<AppState>) {
    let tasks = self.plugins.into_iter().map(|plugin| {
      let app = app.clone();
      let name = plugin.name();

      info!("init `{}`", name);

      tokio::spawn(async move {
        if let Err(err) = plugin.start(app).await {
          error!("failed `{}`: {err:#}", name);
        }
      })
    });

    for result in future::join_all(tasks).await {
      if let Err(err) = result {
        error!("plugin task panicked: {err}");
      }
    }
  }
}
