use std::{fs, path::PathBuf};

use anyhow::Context;
use log::info;
use portal_gateway::RequestGateway;

use crate::commands::{parse_body, parse_pair};

#[derive(Clone, Debug, clap::Parser)]
pub struct DownloadCommand {
    /// Path relative to the API URL
    path: String,
    /// Where to write the response body
    #[arg(short, long)]
    output: PathBuf,
    /// Query parameter as `key=value`; may be repeated
    #[arg(short, long = "query", value_parser = parse_pair)]
    query: Vec<(String, String)>,
    /// POST this JSON body instead of using GET
    #[arg(long, conflicts_with = "query")]
    data: Option<String>,
}

impl DownloadCommand {
    pub async fn exec(self, gateway: &RequestGateway) -> anyhow::Result<()> {
        let Self {
            path,
            output,
            query,
            data,
        } = self;
        let body = match data {
            Some(data) => {
                let data = parse_body(Some(&data))?;
                gateway.post_blob(&path, &data).await?
            }
            None => gateway.get_blob(&path, &query).await?,
        };
        fs::write(&output, &body).with_context(|| format!("Failed to write {output:?}"))?;
        info!("Wrote {} bytes to {output:?}", body.len());
        Ok(())
    }
}
