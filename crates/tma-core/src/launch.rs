use tracing::info;

use crate::{
    config::Config,
    domain::ChatKind,
    init_data::{InitDataFixture, WebAppUser},
    ports::UserClient,
    Result,
};

/// Extra launch context a Mini App would receive alongside the user.
#[derive(Clone, Debug, Default)]
pub struct LaunchOptions {
    pub start_param: Option<String>,
    pub query_id: Option<String>,
    pub chat_instance: Option<String>,
    pub chat_type: Option<ChatKind>,
}

impl LaunchOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            start_param: cfg.start_param().map(str::to_string),
            ..Self::default()
        }
    }
}

/// Build signed initData for whoever `client` is logged in as.
///
/// Connects the client first if needed, so a freshly constructed session can
/// be passed straight in.
pub async fn launch_init_data(
    client: &dyn UserClient,
    secret: &str,
    opts: &LaunchOptions,
) -> Result<String> {
    if !client.is_connected() {
        client.connect().await?;
    }
    let me = client.current_user().await?;

    let mut fixture = InitDataFixture::from_user(WebAppUser::from(&me));
    fixture.start_param = opts.start_param.clone();
    fixture.query_id = opts.query_id.clone();
    fixture.chat_instance = opts.chat_instance.clone();
    fixture.chat_type = opts.chat_type.map(|k| k.as_str().to_string());

    let init_data = fixture.generate(secret)?;
    info!(user_id = me.id.0, "generated launch init data");
    Ok(init_data)
}
