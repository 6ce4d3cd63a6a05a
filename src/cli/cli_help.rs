pub const MIN_TIME_EN_HELPER: &str = "
                                General notes
MiTOC solves the minimum-time problem for a point mass: move a distance L starting and ending at rest,
with the acceleration a(t) bounded by [aL, aU] and the quadratic drag -R*v^2.

The task file is JSON. Only the \"task\" section is required:

  \"task\": {
      \"N\": 100,          number of discretization intervals, integer >= 1
      \"L\": 5.0,          distance, > 0
      \"aU\": 1.0,         upper acceleration bound
      \"aL\": -3.0,        lower acceleration bound, aL < aU
      \"R\": 0.0,          drag coefficient, >= 0
      \"tf_init\": 10.0    initial guess of the final time, > 0
  }

Optional sections:

  \"solver\": tolerance (1e-8), max_iterations (500), mu_init (0.1), bound_push (0.01),
              acceptable_tolerance (1e-6), acceptable_iterations (15), max_backtracks (60)
  \"output\": results_file (results.txt), plot_script (plot.gnu), plot_program (gnuplot),
              plot_image (min_time.png), plot (true), csv_file (null)

The results file has N+1 rows: t x v a, each field in C format %16.4e.
If the plot script does not exist a default gnuplot script is written first.
A failed plot is reported but does not cancel the run.

Command line:
  MiTOC <task.json>     solve the task file and exit
  MiTOC                 interactive menu
The terminal log level is read from MITOC_LOG (error, warn, info, debug, trace, off; default info),
the file MiTOC.log always receives the debug level.
";

pub const MIN_TIME_RU_HELPER: &str = "
                                Общие соображения
MiTOC решает задачу быстродействия для материальной точки: пройти расстояние L из состояния покоя
и остановиться, при ограниченном ускорении aL <= a(t) <= aU и квадратичном сопротивлении -R*v^2.

Файл задания имеет формат JSON. Обязателен только раздел \"task\":
        N: целое >= 1 - число интервалов дискретизации;
        L: > 0 - расстояние;
        aU, aL: границы ускорения, aL < aU;
        R: >= 0 - коэффициент сопротивления;
        tf_init: > 0 - начальное приближение для конечного времени.
Разделы \"solver\" и \"output\" необязательны, неуказанные поля принимают значения по умолчанию.

Файл результатов содержит N+1 строк: t x v a в формате %16.4e.
Ошибка построения графика выводится в лог, но не прерывает расчет.
Уровень логирования в терминале задается переменной окружения MITOC_LOG (по умолчанию info).
";
