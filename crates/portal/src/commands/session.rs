use anyhow::Context;
use log::info;
use portal_gateway::{
    store::{LOCALE_KEY, TOKEN_KEY, USER_INFO_KEY},
    Locale, SessionStore,
};

#[derive(Clone, Debug, clap::Parser)]
pub struct LoginCommand {
    /// Token issued by the backend
    #[arg(long)]
    token: String,
    /// Profile of the signed-in user, as JSON
    #[arg(long)]
    user_info: Option<String>,
}

impl LoginCommand {
    pub fn exec(self, store: &dyn SessionStore) -> anyhow::Result<()> {
        let Self { token, user_info } = self;
        if let Some(user_info) = user_info {
            serde_json::from_str::<serde_json::Value>(&user_info)
                .context("--user-info is not valid JSON")?;
            store.set(USER_INFO_KEY, &user_info)?;
        }
        store.set(TOKEN_KEY, token.trim())?;
        info!("Stored token");
        Ok(())
    }
}

#[derive(Clone, Debug, clap::Parser)]
pub struct LogoutCommand;

impl LogoutCommand {
    pub fn exec(self, store: &dyn SessionStore) -> anyhow::Result<()> {
        store.remove(TOKEN_KEY)?;
        store.remove(USER_INFO_KEY)?;
        info!("Removed token and user profile");
        Ok(())
    }
}

#[derive(Clone, Debug, clap::Parser)]
pub struct LocaleCommand {
    value: String,
}

impl LocaleCommand {
    pub fn exec(self, store: &dyn SessionStore) -> anyhow::Result<()> {
        let Self { value } = self;
        store.set(LOCALE_KEY, &value)?;
        println!(
            "Requests will use language {}",
            Locale::from_preference(Some(&value))
        );
        Ok(())
    }
}
