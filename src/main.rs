#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    venue_desk::logger::init();
    let _ = venue_desk::rocket().launch().await?;
    Ok(())
}
