use futures_util::StreamExt;
use gatecord::{
    config::Config,
    ws::{Credentials, Gateway, GatewayEvent},
};

const DEFAULT_GATEWAY: &str = "wss://gateway.discord.gg";

// GUILDS | GUILD_MESSAGES
const INTENTS: u64 = 1 | 1 << 9;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let token = std::env::var("BOT_TOKEN")
        .map_err(|_| {
            println!("No BOT_TOKEN env var or invalid");
            std::process::exit(1);
        })
        .unwrap();

    let url = std::env::var("GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY.to_string());

    let mut gateway = Gateway::new(Config::default());
    let mut events = gateway
        .start(&url, Credentials::new(&token, INTENTS))
        .unwrap();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received, stopping");
                break;
            }
            item = events.next() => match item {
                Some(Ok(GatewayEvent::Dispatch(event))) => {
                    log::info!("Received {} #{}: {}", event.name, event.sequence, event.payload)
                }
                Some(Ok(GatewayEvent::SessionReset)) => log::warn!("Session reset"),
                Some(Err(err)) => {
                    log::error!("Gateway failed: {}", err);
                    break;
                }
                None => break,
            }
        }
    }

    gateway.stop().await;
}
