#[actix_web::main]
async fn main() -> std::io::Result<()> {
    psi_training_server::run().await
}
