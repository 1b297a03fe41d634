fn main() {
    // ESP-IDF link arguments are only needed for the device binary.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
