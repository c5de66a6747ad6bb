fn main() {
    println!("cargo:rerun-if-changed=sdkconfig.defaults");

    // Host builds (library + tests) carry no ESP-IDF environment.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
