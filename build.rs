fn main() {
    // Only meaningful when cross-compiling for ESP-IDF; on the host the
    // sysenv variables are simply absent.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
