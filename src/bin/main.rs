use broker_tool_gateway::{agent::Orchestrator, config::GatewayConfig};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const HELP_TEXT: &str = r#"
📚 Broker Trading Assistant - Help

🔍 Market data:
   • "What is the current price of RELIANCE?"
   • "Show me candle data for SBIN for last week"
   • "Search for HDFC Bank stock details"

📊 Portfolio & account:
   • "Show me my current holdings"
   • "What are my open positions?"
   • "What are my RMS limits?"

📈 Market analysis:
   • "Show me today's top gainers"
   • "Get NIFTY option Greeks for this month's expiry"
   • "What is the current put-call ratio?"

📋 Orders:
   • "Show my order book"
   • "Place a buy order for 10 shares of RELIANCE at market price"
   • "Cancel order 201020000000080"

⚠️  Safety:
   • DRY_RUN_MODE=true (the default) simulates every order, GTT rule and conversion
   • MAX_ORDER_QUANTITY caps the quantity of any single order
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env().map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    info!(
        model = %config.ai.model,
        dry_run = config.trading.dry_run,
        max_order_quantity = config.trading.max_order_quantity,
        "Broker tool gateway starting"
    );

    let orchestrator = Orchestrator::from_config(&config)?;
    let tool_count = orchestrator.registry().list_tools().len();

    println!("\n{}", "=".repeat(60));
    println!("🚀 Broker Trading Assistant started ({} tools)", tool_count);
    println!("⚙️  Dry run mode: {}", config.trading.dry_run);
    println!("💡 Type 'help' for examples, 'quit' to exit");
    println!("{}", "=".repeat(60));

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        stdout.write_all("\n💬 Your Query: ".as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!("\n👋 Goodbye!");
            break;
        };
        let query = line.trim();

        match query.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("👋 Goodbye!");
                break;
            }
            "help" => {
                println!("{}", HELP_TEXT);
                continue;
            }
            "" => {
                println!("❓ Please enter a query or type 'help' for examples.");
                continue;
            }
            _ => {}
        }

        println!("\n🤔 Processing your request...");
        let turn = orchestrator.run(query).await;
        println!("\n💡 Response:\n{}", turn.text);
    }

    Ok(())
}
