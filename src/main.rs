fn main() {
    casevault_lib::run()
}
