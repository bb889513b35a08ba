use portal_gateway::RequestGateway;
use serde_json::Value;

use crate::commands::{parse_body, parse_pair, print_json};

#[derive(Clone, Debug, clap::Parser)]
pub struct QueryCommand {
    /// Path relative to the API URL
    path: String,
    /// Query parameter as `key=value`; may be repeated
    #[arg(short, long = "query", value_parser = parse_pair)]
    query: Vec<(String, String)>,
}

impl QueryCommand {
    pub async fn exec(self, gateway: &RequestGateway, unwrap_data: bool) -> anyhow::Result<()> {
        let Self { path, query } = self;
        let value = if unwrap_data {
            gateway.get_json::<Value, _>(&path, &query).await?
        } else {
            gateway.get(&path, &query).await?
        };
        print_json(&value)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum BodyVerb {
    Post,
    PostJson,
    Put,
    Delete,
}

#[derive(Clone, Debug, clap::Parser)]
pub struct BodyCommand {
    /// Path relative to the API URL
    path: String,
    /// JSON body; defaults to `{}`
    #[arg(long)]
    data: Option<String>,
}

impl BodyCommand {
    pub async fn exec(self, gateway: &RequestGateway, verb: BodyVerb) -> anyhow::Result<()> {
        let Self { path, data } = self;
        let body = parse_body(data.as_deref())?;
        let value = match verb {
            BodyVerb::Post => serde_json::to_value(gateway.post(&path, &body).await?)?,
            BodyVerb::PostJson => gateway.post_json::<Value, _>(&path, &body).await?,
            BodyVerb::Put => serde_json::to_value(gateway.put(&path, &body).await?)?,
            BodyVerb::Delete => serde_json::to_value(gateway.del(&path, &body).await?)?,
        };
        print_json(&value)
    }
}
