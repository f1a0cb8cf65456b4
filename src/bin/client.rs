use clap::{Args, Parser, Subcommand};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "resto-server")]
#[command(about = "client cli used by restaurant staffs to interact with the server", version, long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// payment proxy ops
    #[command(arg_required_else_help = true)]
    Payment(PaymentArgs),
    /// order workflow ops
    #[command(arg_required_else_help = true)]
    Order(OrderArgs),
}

#[derive(Debug, Args)]
struct PaymentArgs {
    #[command(subcommand)]
    command: PaymentCmds,
}

#[derive(Debug, Subcommand)]
enum PaymentCmds {
    #[command(arg_required_else_help = true)]
    Init {
        #[arg(long, help = "Amount to charge.")]
        amount: f64,
        #[arg(long, help = "Human-readable description.")]
        description: String,
        #[arg(long, help = "Redirect target on success.")]
        success_url: String,
        #[arg(long, help = "Redirect target on failure.")]
        failure_url: String,
        #[arg(long, help = "Order id to attach, if any.")]
        order_id: Option<String>,
    },
    #[command(arg_required_else_help = true)]
    Status {
        #[arg(long, help = "Transaction id returned by init.")]
        id: String,
    },
}

#[derive(Debug, Args)]
struct OrderArgs {
    #[arg(short = 'o', help = "Order id to operate", value_parser = clap::value_parser!(i64).range(1..))]
    oid: i64,
    #[command(subcommand)]
    command: OrderCmds,
}

#[derive(Debug, Subcommand)]
enum OrderCmds {
    #[command(arg_required_else_help = true)]
    Status {
        #[arg(long, help = "Target status, e.g. preparing or delivered.")]
        to: String,
        #[arg(long, help = "Failure reason, required when moving to failed.")]
        reason: Option<String>,
        #[arg(long, help = "Mark the order paid along with the transition.")]
        paid: Option<bool>,
    },
    /// approve the points grant for the order
    Credit,
}

const HOST: &str = "http://localhost:3000";

#[derive(Debug, Deserialize)]
struct InitResponse {
    #[serde(rename = "paymentUrl")]
    payment_url: String,
    #[serde(rename = "transactionId")]
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct CreditResponse {
    credited: i64,
    already_credited: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();

    match args.command {
        Commands::Payment(payment) => match payment.command {
            PaymentCmds::Init {
                amount,
                description,
                success_url,
                failure_url,
                order_id,
            } => {
                println!("initiating a payment of {}", amount);
                let res = Client::new()
                    .post(format!("{}/api/payment/init", HOST))
                    .json(&serde_json::json!({
                        "amount": amount,
                        "description": description,
                        "success_url": success_url,
                        "failure_url": failure_url,
                        "order_id": order_id,
                    }))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => {
                        let res = res
                            .json::<InitResponse>()
                            .await
                            .expect("failed to get response, aborting");
                        println!(
                            "payment saved, transaction={} url={}",
                            res.transaction_id, res.payment_url
                        );
                    }
                    StatusCode::BAD_REQUEST => {
                        println!("the gateway refused the request, check the fields");
                    }
                    unexpected => {
                        println!("got unexpected status code, {}", unexpected);
                    }
                }
            }
            PaymentCmds::Status { id } => {
                let res = Client::new()
                    .get(format!("{}/api/payment/status", HOST))
                    .query(&[("transaction_id", id.as_str())])
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => {
                        let res = res
                            .json::<StatusResponse>()
                            .await
                            .expect("failed to get response, aborting");
                        println!("transaction {} is {}", id, res.status);
                    }
                    unexpected => {
                        println!("got unexpected status code, {}", unexpected);
                    }
                }
            }
        },
        Commands::Order(order) => {
            let order_id = order.oid;
            match order.command {
                OrderCmds::Status { to, reason, paid } => {
                    println!("moving order={} to {}", order_id, to);
                    let res = Client::new()
                        .patch(format!("{}/v1/order/{}/status", HOST, order_id))
                        .json(&serde_json::json!({
                            "status": to,
                            "reason": reason,
                            "is_paid": paid,
                        }))
                        .send()
                        .await?;
                    match res.status() {
                        StatusCode::OK => {
                            println!("order {} moved to {}", order_id, to);
                        }
                        StatusCode::BAD_REQUEST => {
                            println!("transition refused; failed needs a --reason");
                        }
                        StatusCode::NOT_FOUND => {
                            println!("order {} not found", order_id);
                        }
                        unexpected => {
                            println!("got unexpected status code, {}", unexpected);
                        }
                    }
                }
                OrderCmds::Credit => {
                    let res = Client::new()
                        .post(format!("{}/v1/order/{}/points/credit", HOST, order_id))
                        .send()
                        .await?;
                    match res.status() {
                        StatusCode::OK => {
                            let res = res
                                .json::<CreditResponse>()
                                .await
                                .expect("failed to get response, aborting");
                            if res.already_credited {
                                println!("order {} was already credited", order_id);
                            } else {
                                println!("credited {} points for order {}", res.credited, order_id);
                            }
                        }
                        StatusCode::BAD_REQUEST => {
                            println!("order {} is not eligible for points", order_id);
                        }
                        StatusCode::NOT_FOUND => {
                            println!("order {} not found", order_id);
                        }
                        unexpected => {
                            println!("got unexpected status code, {}", unexpected);
                        }
                    }
                }
            }
        }
    };
    Ok(())
}
