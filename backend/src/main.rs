#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(missing_docs)]

#[tokio::main]
async fn main() {
    pergola::app::run().await;
}
