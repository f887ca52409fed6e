use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use log::debug;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, RekognitionOptions};
use crate::server::{CompareResponse, page};
use crate::workflow::{ComparisonResult, CompareSession, Outcome};
use crate::{ImagePayload, RekognitionClient};

#[derive(Parser, Debug, Clone)]
pub struct CompareCommand {
    #[command(flatten)]
    pub rekognition: RekognitionOptions,
    /// 第一张图片（源图片）路径
    pub source: PathBuf,
    /// 第二张图片（目标图片）路径
    pub target: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for CompareCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let source = ImagePayload::from_path(&self.source)?;
        let target = ImagePayload::from_path(&self.target)?;
        debug!("源图片: {:?}，目标图片: {:?}", source, target);

        let client = RekognitionClient::from_options(&self.rekognition)?;
        let mut session = CompareSession::new(self.rekognition.similarity_threshold);
        session.set_source(source);
        session.set_target(target);

        let outcome = session.submit(&client).await;
        print_outcome(&outcome, self)
    }
}

fn print_outcome(outcome: &Outcome, opts: &CompareCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&CompareResponse::from(outcome))?)
        }
        OutputFormat::Table => match outcome {
            Outcome::IncompleteInput => println!("{}", page::INCOMPLETE_NOTICE),
            Outcome::Completed(ComparisonResult::Matches(matches)) => {
                for m in matches {
                    println!("{}", page::similarity_line(m));
                }
            }
            Outcome::Completed(ComparisonResult::NoMatch) => println!("{}", page::NO_MATCH_NOTICE),
            Outcome::Completed(ComparisonResult::Failure(_)) => {}
        },
    }
    match outcome {
        Outcome::Completed(ComparisonResult::Failure(e)) => Err(anyhow!("{}", page::failure_line(e))),
        _ => Ok(()),
    }
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            _ => Ok(Self::Table),
        }
    }
}
