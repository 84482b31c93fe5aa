fn main() {
    oneconf::run_cli();
}
