use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use embryo_grader::clients::{ModelClient, VisionModel};
use embryo_grader::config::Config;
use embryo_grader::orchestrator::{run_extract, run_feedback_analysis, BatchGrader};
use embryo_grader::utils::logging;
use embryo_grader::workflow::GradingFlow;

/// 基于 Gemini 多模态模型的囊胚 Gardner 分级工具
#[derive(Debug, Parser)]
#[command(name = "embryo-grader", version, about)]
struct Cli {
    /// TOML 配置文件（也可用 GRADER_CONFIG 指定）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 从 HTML 报告中提取内嵌图片
    Extract {
        /// 输入的 HTML 文件
        #[arg(long)]
        html: Option<PathBuf>,
        /// 图片输出目录
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 对图片目录中的所有胚胎图片分级
    Grade {
        /// 图片目录
        #[arg(long)]
        images: Option<PathBuf>,
        /// 报告输出目录
        #[arg(long)]
        out: Option<PathBuf>,
        /// Gemini API Key
        #[arg(long)]
        api_key: Option<String>,
        /// 追加到提示词前面的补充说明文件
        #[arg(long)]
        prompt_supplement: Option<PathBuf>,
    },
    /// 分析专家反馈并生成补充提示词
    Improve {
        /// 专家反馈 CSV
        feedback_csv: PathBuf,
        /// 分析结果输出目录
        #[arg(long)]
        out: Option<PathBuf>,
        /// 使用新提示词重新分级
        #[arg(long)]
        regrade: bool,
        /// 重新分级时使用的图片目录
        #[arg(long)]
        images: Option<PathBuf>,
        /// Gemini API Key
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::load(cli.config.as_deref())?;
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    if let Err(e) = run(cli.command, config).await {
        error!("❌ {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, mut config: Config) -> Result<()> {
    match command {
        Command::Extract { html, out } => {
            logging::log_startup("提取 HTML 内嵌图片");
            let html = html.unwrap_or_else(|| config.html_file.clone());
            let out = out.unwrap_or_else(|| config.image_dir.clone());
            run_extract(&html, &out, &config.filename_pattern).await?;
        }
        Command::Grade {
            images,
            out,
            api_key,
            prompt_supplement,
        } => {
            logging::log_startup("胚胎 Gardner 分级");
            if let Some(dir) = images {
                config.image_dir = dir;
            }
            if let Some(dir) = out {
                config.output_dir = dir;
            }

            let supplement = match prompt_supplement {
                Some(path) => {
                    let text = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("无法读取补充提示词: {}", path.display()))?;
                    Some(text)
                }
                None => None,
            };

            grade(config, api_key, supplement.as_deref()).await?;
        }
        Command::Improve {
            feedback_csv,
            out,
            regrade,
            images,
            api_key,
        } => {
            logging::log_startup("专家反馈分析");
            let out = out.unwrap_or_else(|| config.improved_output_dir.clone());
            let outcome = run_feedback_analysis(&feedback_csv, &out)?;

            if regrade {
                match outcome.supplement() {
                    Some(supplement) => {
                        if let Some(dir) = images {
                            config.image_dir = dir;
                        }
                        config.output_dir = out;
                        info!("\n🔁 使用改进后的提示词重新分级");
                        grade(config, api_key, Some(supplement)).await?;
                    }
                    None => info!("没有新的提示词补充，跳过重新分级"),
                }
            } else if outcome.supplement().is_some() {
                info!(
                    "💡 可使用 `embryo-grader grade --prompt-supplement {}` 重新分级",
                    outcome.prompt_path.display()
                );
            }
        }
    }

    Ok(())
}

/// 创建模型客户端并运行批量分级
async fn grade(
    mut config: Config,
    api_key: Option<String>,
    supplement: Option<&str>,
) -> Result<()> {
    let api_key = config.resolve_api_key(api_key)?;
    let client = ModelClient::from_config(&config, &api_key)?;
    info!("🔌 Provider: {} ({})", config.provider, client.model_name());

    let flow = GradingFlow::new(client, supplement);
    let outcome = BatchGrader::new(config, flow).run().await?;

    if let Some(reports) = outcome.reports {
        info!("📄 CSV: {}", reports.csv.display());
        info!("📄 JSON: {}", reports.json.display());
        info!("🌐 HTML: {}", reports.html.display());
    }
    Ok(())
}
