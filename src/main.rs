//! leverdesk
//!
//! Terminal client for a simulated leveraged crypto-trading platform, with
//! a live candle feed and a small market-data proxy.

mod api;
mod config;
mod feed;
mod forms;
mod models;
mod notify;
mod proxy;
mod session;
#[cfg(test)]
mod testing;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{ApiError, BackendClient, LoginRequest, MarketClient, SignupRequest};
use crate::config::{AppConfig, DEFAULT_PROXY_BIND, DEFAULT_SERVER_URL, DEFAULT_SESSION_FILE};
use crate::feed::{ChartFeed, ChartState, EXCHANGE_WS_URL};
use crate::forms::{LiquidateForm, QuantityPreset, TradeForm};
use crate::models::{
    asset_label, AssetSymbol, Leverage, PortfolioStats, PositionType, Profile, Trade,
    TradeFilter, TradeHistoryStats,
};
use crate::notify::Notifier;
use crate::session::{Session, SessionStore};

/// Leveraged trading terminal.
#[derive(Parser)]
#[command(name = "leverdesk")]
#[command(about = "Trade, track and chart on a simulated leveraged exchange", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Trading backend URL
    #[arg(long, env = "SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Session file path
    #[arg(long, env = "LEVERDESK_SESSION", default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,

    /// Exchange REST URL
    #[arg(long, env = "EXCHANGE_REST_URL", default_value = api::EXCHANGE_REST_URL)]
    exchange_rest_url: String,

    /// Exchange websocket URL
    #[arg(long, env = "EXCHANGE_WS_URL", default_value = EXCHANGE_WS_URL)]
    exchange_ws_url: String,

    /// Fetch chart data through a running proxy at this URL
    #[arg(long, env = "MARKET_VIA_PROXY")]
    market_via_proxy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        #[arg(long)]
        firstname: String,
        #[arg(long)]
        lastname: String,
        #[arg(long)]
        email: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Forget the session
    Logout,

    /// Account details and trading statistics
    Profile,

    /// Balance, portfolio stats and active trades
    Dashboard,

    /// Trade history
    History {
        /// all, active, or liquidated
        #[arg(short, long, default_value = "all")]
        filter: TradeFilter,
    },

    /// Open a leveraged position
    Trade {
        /// BTC, ETH or SOL
        #[arg(short, long, default_value = "BTC")]
        asset: AssetSymbol,

        /// long or short
        #[arg(short, long, default_value = "long")]
        side: PositionType,

        /// 1, 2, 5, 10, 25 or 100
        #[arg(short = 'x', long, default_value = "5")]
        leverage: Leverage,

        #[arg(short, long)]
        quantity: String,

        /// Slippage tolerance in bips
        #[arg(long, default_value = "1")]
        slippage: String,
    },

    /// Close all or part of an active trade
    Liquidate {
        /// Trade id
        #[arg(long)]
        id: String,

        /// Quantity to close (defaults to the whole position)
        #[arg(short, long, conflicts_with = "preset")]
        quantity: Option<String>,

        /// 25, 50, 75 or max
        #[arg(short, long)]
        preset: Option<QuantityPreset>,
    },

    /// List supported assets
    Assets,

    /// Live price chart; type BTC, ETH or SOL to switch
    Chart {
        #[arg(short, long, default_value = "SOL")]
        asset: AssetSymbol,
    },

    /// Run the market-data proxy
    Serve {
        #[arg(short, long, env = "PROXY_BIND", default_value = DEFAULT_PROXY_BIND)]
        bind: String,
    },

    /// Check the backend is up
    Health,
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        AppConfig {
            server_url: self.server_url.clone(),
            exchange_rest_url: self.exchange_rest_url.clone(),
            exchange_ws_url: self.exchange_ws_url.clone(),
            session_file: self.session_file.clone(),
            market_via_proxy: self.market_via_proxy.clone(),
            ..AppConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.app_config();
    let mut notifier = Notifier::new();

    let client = BackendClient::new(&config.server_url)?;
    let mut session = Session::new(client, SessionStore::new(&config.session_file));

    match cli.command {
        Commands::Signup {
            firstname,
            lastname,
            email,
            username,
            password,
        } => {
            let request = SignupRequest {
                firstname,
                lastname,
                email,
                username,
                password,
            };
            match session.signup(&request).await {
                Ok(response) => {
                    notifier.success(response.message);
                    println!("Account created. Log in with 'leverdesk login'.");
                }
                Err(e) => {
                    notifier.error(e.user_message("Signup failed"));
                }
            }
        }

        Commands::Login { username, password } => {
            let request = LoginRequest { username, password };
            match session.login(&request).await {
                Ok(()) => match session.user() {
                    Some(user) => {
                        notifier.success(format!("Welcome back, {}!", user.display_name()));
                    }
                    None => {
                        notifier.warning("Logged in, but the profile could not be loaded");
                    }
                },
                Err(e) => {
                    notifier.error(e.user_message("Login failed"));
                }
            }
        }

        Commands::Logout => {
            session.logout()?;
            notifier.info("Logged out");
        }

        Commands::Profile => {
            let Some(user) = require_login(&mut session).await else {
                return Ok(());
            };

            let Some(stats) = profile_stats(&mut session, &mut notifier).await else {
                return Ok(());
            };
            print_profile(&user, &stats);
        }

        Commands::Dashboard => {
            let Some(user) = require_login(&mut session).await else {
                return Ok(());
            };

            let client = session.client();
            let fetched = tokio::try_join!(client.get_balance(), client.get_active_trades());
            let (balance, trades) = match fetched {
                Ok(fetched) => fetched,
                Err(e) => {
                    report(&mut session, &mut notifier, &e, "Failed to load dashboard");
                    return Ok(());
                }
            };

            let prices = current_prices(&config.market_client()?, &trades).await;
            let stats = PortfolioStats::from_active(&trades);

            println!("\n=== Dashboard: {} ===", user.display_name());
            println!("Balance:          {}", money(balance.amount()));
            println!("Active Trades:    {}", trades.len());
            println!("Position Value:   {}", money(stats.total_position_value));
            println!("Long / Short:     {} / {}", stats.long_positions, stats.short_positions);

            println!("\n--- Active Positions ---");
            if trades.is_empty() {
                println!("No active trades. Open one with 'leverdesk trade'.");
            } else {
                print_trades(&trades, &prices);
            }
        }

        Commands::History { filter } => {
            if require_login(&mut session).await.is_none() {
                return Ok(());
            }

            let trades = match session.client().get_all_trades().await {
                Ok(trades) => trades,
                Err(e) => {
                    report(&mut session, &mut notifier, &e, "Failed to load trades");
                    return Ok(());
                }
            };
            let stats = TradeHistoryStats::calculate(&trades);

            println!("\n=== {} ===", filter.title());
            println!(
                "All: {}  Active: {}  Liquidated: {}  Total P&L: {}",
                stats.total_trades,
                stats.active_trades,
                stats.closed_trades,
                signed_money(stats.total_pnl)
            );
            println!();

            let shown: Vec<Trade> = filter.apply(&trades).into_iter().cloned().collect();
            if shown.is_empty() {
                println!("No trades found.");
            } else {
                print_trades(&shown, &HashMap::new());
            }
        }

        Commands::Trade {
            asset,
            side,
            leverage,
            quantity,
            slippage,
        } => {
            if require_login(&mut session).await.is_none() {
                return Ok(());
            }

            let supported = match session.client().get_supported_assets().await {
                Ok(assets) => assets,
                Err(e) => {
                    warn!(error = %e, "Could not load supported assets");
                    Vec::new()
                }
            };

            let mut form = TradeForm {
                asset,
                position_type: side,
                leverage,
                quantity,
                slippage,
            };
            println!("{}: {} {} at {}", form.submit_label(), form.quantity, asset, leverage);
            form.submit(session.client(), &supported, &mut notifier).await;
        }

        Commands::Liquidate {
            id,
            quantity,
            preset,
        } => {
            if require_login(&mut session).await.is_none() {
                return Ok(());
            }

            let trades = match session.client().get_active_trades().await {
                Ok(trades) => trades,
                Err(e) => {
                    report(&mut session, &mut notifier, &e, "Failed to load trades");
                    return Ok(());
                }
            };
            let Some(trade) = trades.into_iter().find(|t| t.id == id) else {
                notifier.error(format!("No active trade with id {}", id));
                return Ok(());
            };

            let mut form = LiquidateForm::new(trade);
            if let Some(preset) = preset {
                form.apply_preset(preset);
            } else if let Some(quantity) = quantity {
                form.quantity = quantity;
            }

            println!(
                "Closing {} of {} {} (available {})",
                form.quantity,
                form.trade().asset_symbol(),
                form.trade().position_type.as_str(),
                form.trade().quantity.normalize()
            );
            form.submit(session.client(), &mut notifier).await;
        }

        Commands::Assets => match session.client().get_supported_assets().await {
            Ok(assets) => {
                println!("\n{:<24} {:<10}", "ASSET", "PAIR");
                println!("{}", "-".repeat(34));
                for asset in assets {
                    let pair = asset
                        .symbol
                        .parse::<AssetSymbol>()
                        .map(|s| s.pair())
                        .unwrap_or("-");
                    println!("{:<24} {:<10}", truncate(&asset.label(), 24), pair);
                }
            }
            Err(e) => {
                notifier.error(e.user_message("Failed to load assets"));
            }
        },

        Commands::Chart { asset } => {
            run_chart(&config, asset, &mut notifier).await?;
        }

        Commands::Serve { bind } => {
            println!("Proxying market data from {} on http://{}", config.exchange_rest_url, bind);
            println!("Press Ctrl+C to stop.\n");
            proxy::serve(config.exchange_client()?, &bind).await?;
        }

        Commands::Health => match session.client().health_check().await {
            Ok(response) => println!("Backend {} is up: {}", config.server_url, response.message),
            Err(e) => {
                notifier.error(format!("Backend {} is unreachable: {}", config.server_url, e));
            }
        },
    }

    Ok(())
}

/// Gate for pages that need a user. Prints a login hint when there is none.
async fn require_login(session: &mut Session) -> Option<Profile> {
    let user = session.check_auth().await.cloned();
    if user.is_none() {
        println!("Not logged in. Run 'leverdesk login --username <name> --password <password>' first.");
    }
    user
}

/// Surface a failed call and end the session on 401.
fn report(session: &mut Session, notifier: &mut Notifier, error: &ApiError, fallback: &str) {
    session.handle_error(error);
    if error.is_unauthorized() {
        notifier.error("Session expired. Please log in again.");
    } else {
        notifier.error(error.user_message(fallback));
    }
}

/// Stats for the profile page. A failed load shows zeroed stats, except
/// after a 401, which ends the session and yields `None`.
async fn profile_stats(session: &mut Session, notifier: &mut Notifier) -> Option<TradeHistoryStats> {
    match session.client().get_all_trades().await {
        Ok(trades) => Some(TradeHistoryStats::calculate(&trades)),
        Err(e) => {
            report(session, notifier, &e, "Failed to load trades");
            if e.is_unauthorized() {
                None
            } else {
                Some(TradeHistoryStats::default())
            }
        }
    }
}

/// Last prices for every asset held, keyed by backend asset id.
async fn current_prices(market: &MarketClient, trades: &[Trade]) -> HashMap<i64, Decimal> {
    let mut ids: Vec<i64> = trades.iter().map(|t| t.asset_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let lookups = ids.into_iter().filter_map(|id| {
        let symbol = AssetSymbol::from_id(id)?;
        Some(async move { (id, market.get_ticker(symbol.pair()).await) })
    });

    let mut prices = HashMap::new();
    for (id, result) in futures::future::join_all(lookups).await {
        match result {
            Ok(ticker) => {
                prices.insert(id, ticker.last_price);
            }
            Err(e) => warn!(asset = asset_label(id), error = %e, "No live price"),
        }
    }
    prices
}

fn print_profile(user: &Profile, stats: &TradeHistoryStats) {
    println!("\n=== [{}] {} ===", user.initial(), user.display_name());
    println!("Username:         {}", user.username);
    println!("Email:            {}", user.email);
    println!("Fund:             {}", money(user.fund));

    println!("\n--- Trading Statistics ---");
    println!("Total Trades:     {}", stats.total_trades);
    println!("Active:           {}", stats.active_trades);
    println!("Closed:           {}", stats.closed_trades);
    println!("Winning:          {}", stats.winning_trades);
    println!("Win Rate:         {}%", stats.win_rate_label());
    println!("Total P&L:        {}", signed_money(stats.total_pnl));
}

fn print_trades(trades: &[Trade], prices: &HashMap<i64, Decimal>) {
    println!(
        "{:<14} {:<6} {:<6} {:>5} {:>10} {:>12} {:>12} {:>13} {:>8} {:<10}",
        "ID", "ASSET", "TYPE", "LEV", "QTY", "OPEN", "CLOSE", "P&L", "P&L%", "STATUS"
    );
    println!("{}", "-".repeat(104));

    for trade in trades {
        let pnl = trade.display_pnl(prices.get(&trade.asset_id).copied());
        let close = if trade.liquidated {
            money(trade.close_price)
        } else {
            "-".to_string()
        };
        println!(
            "{:<14} {:<6} {:<6} {:>4}x {:>10} {:>12} {:>12} {:>13} {:>7.2}% {:<10}",
            truncate(&trade.id, 14),
            trade.asset_symbol(),
            trade.position_type.as_str(),
            trade.leverage.normalize(),
            trade.quantity.normalize(),
            money(trade.open_price),
            close,
            signed_money(pnl),
            trade.pnl_percentage(pnl),
            if trade.liquidated { "Closed" } else { "Active" }
        );
    }
}

/// Live chart loop: status line every second, asset switches from stdin,
/// Ctrl+C to quit.
async fn run_chart(config: &AppConfig, asset: AssetSymbol, notifier: &mut Notifier) -> Result<()> {
    let mut feed = ChartFeed::new(
        config.feed.clone(),
        config.market_client()?,
        config.exchange_ws_url.clone(),
    );
    let state = feed.state();

    println!("Streaming {}. Type BTC, ETH or SOL to switch, Ctrl+C to quit.\n", asset.pair());
    feed.select_asset(asset).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_warning = None;
    let mut render = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping chart...");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(input)) => {
                    let input = input.trim();
                    if input.is_empty() {
                        continue;
                    }
                    match input.parse::<AssetSymbol>() {
                        Ok(next) => {
                            if let Some(id) = last_warning.take() {
                                notifier.remove(id);
                            }
                            if feed.asset() == Some(next) {
                                notifier.info(format!("Already showing {}", next.pair()));
                            } else {
                                feed.select_asset(next).await;
                            }
                        }
                        Err(_) => {
                            last_warning = Some(notifier.warning(format!("Unknown asset '{}'", input)));
                        }
                    }
                }
                // Keep streaming until Ctrl+C
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            },
            _ = render.tick() => {
                println!("{}", chart_line(&*state.read().await));
                for notification in notifier.active() {
                    println!("  {}", notification);
                }
            }
        }
    }

    feed.close().await;
    {
        let state = state.read().await;
        info!(
            generations = state.generation(),
            dropped = state.dropped_updates(),
            "Chart closed"
        );
    }
    Ok(())
}

fn chart_line(state: &ChartState) -> String {
    let asset = state.asset().map(|a| a.pair()).unwrap_or("-");
    let time = chrono::Local::now().format("%H:%M:%S");

    if state.is_loading() && state.candles().is_empty() {
        return format!("[{}] {} loading... ({})", time, asset, state.status());
    }

    let ticker = match state.ticker() {
        Some(t) => format!(
            "{} {}{}% | H {} L {} | Vol {}",
            t.last_price,
            if t.is_positive() { "+" } else { "" },
            t.price_change_percent,
            t.high,
            t.low,
            t.volume
        ),
        None => "no ticker".to_string(),
    };
    let candle = match state.candles().last() {
        Some(c) => format!(
            "{} O {} H {} L {} C {}",
            if c.is_bullish() { "▲" } else { "▼" },
            c.open,
            c.high,
            c.low,
            c.close
        ),
        None => "no candles".to_string(),
    };

    format!(
        "[{}] {} {} | {} | {} bars | {}",
        time,
        asset,
        ticker,
        candle,
        state.candles().len(),
        state.status()
    )
}

fn money(value: Decimal) -> String {
    format!("${:.2}", value)
}

fn signed_money(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        format!("+${:.2}", value)
    } else {
        format!("-${:.2}", value.abs())
    }
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
