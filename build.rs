fn main() {
    // ESP-IDF environment is only needed for Xtensa/RISC-V device builds; host
    // builds and tests skip it. Build scripts run on the host, so check TARGET.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") || target.contains("espidf") {
            embuild::espidf::sysenv::output();
        }
    }
}
